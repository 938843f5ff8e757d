use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Single document table. `body` holds the whole item as JSON; the key
/// attributes of the primary and secondary indexes are copied into columns.
#[derive(Iden)]
enum Items {
    Table,
    Pk,
    Sk,
    #[iden = "gsi1pk"]
    Gsi1Pk,
    #[iden = "gsi1sk"]
    Gsi1Sk,
    #[iden = "gsi2pk"]
    Gsi2Pk,
    #[iden = "gsi2sk"]
    Gsi2Sk,
    #[iden = "gsi3pk"]
    Gsi3Pk,
    Body,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Items::Pk).string().not_null())
                    .col(ColumnDef::new(Items::Sk).string().not_null())
                    .col(ColumnDef::new(Items::Gsi1Pk).string())
                    .col(ColumnDef::new(Items::Gsi1Sk).string())
                    .col(ColumnDef::new(Items::Gsi2Pk).string())
                    .col(ColumnDef::new(Items::Gsi2Sk).string())
                    .col(ColumnDef::new(Items::Gsi3Pk).string())
                    .col(ColumnDef::new(Items::Body).text().not_null())
                    .primary_key(Index::create().col(Items::Pk).col(Items::Sk))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-items-by_month")
                    .table(Items::Table)
                    .col(Items::Gsi1Pk)
                    .col(Items::Gsi1Sk)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-items-by_category")
                    .table(Items::Table)
                    .col(Items::Gsi2Pk)
                    .col(Items::Gsi2Sk)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-items-by_id")
                    .table(Items::Table)
                    .col(Items::Gsi3Pk)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await
    }
}
