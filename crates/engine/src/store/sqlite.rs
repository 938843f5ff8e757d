use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, QueryResult, Statement,
    TransactionTrait, Value,
};

use super::{
    Condition, DocumentStore, Index, MAX_BATCH_ITEMS, QueryPage, QueryRequest, SortKeyCondition,
    StoreError, check_condition, key_projection,
};
use crate::{item::Item, keys, keys::PrimaryKey};

/// Store persisting items in the `items` table of a SQL database.
///
/// Every item is kept whole as a JSON `body`; the key attributes are copied
/// into indexed columns so index queries run in SQL.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    /// Open a connection; the schema is expected to be migrated already.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(Database::connect(url).await?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.database
    }
}

fn columns(index: Index) -> (&'static str, &'static str) {
    match index {
        Index::Primary => ("pk", "sk"),
        Index::ByMonth => ("gsi1pk", "gsi1sk"),
        Index::ByCategory => ("gsi2pk", "gsi2sk"),
        // No sort key: rows order by primary key alone.
        Index::ById => ("gsi3pk", "''"),
    }
}

fn attribute(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|value| value.as_str())
        .map(ToString::to_string)
}

fn decode_row(row: &QueryResult) -> Result<Item, StoreError> {
    let body: String = row.try_get("", "body")?;
    Ok(serde_json::from_str(&body)?)
}

async fn current(
    db_tx: &DatabaseTransaction,
    key: &PrimaryKey,
) -> Result<Option<Item>, StoreError> {
    let row = db_tx
        .query_one(Statement::from_sql_and_values(
            db_tx.get_database_backend(),
            "SELECT body FROM items WHERE pk = ? AND sk = ?;",
            vec![key.partition.clone().into(), key.sort.clone().into()],
        ))
        .await?;
    row.as_ref().map(decode_row).transpose()
}

async fn upsert(db_tx: &DatabaseTransaction, item: &Item) -> Result<(), StoreError> {
    let key = PrimaryKey::of(item)
        .ok_or_else(|| StoreError::Backend("item has no primary key".to_string()))?;
    let body = serde_json::to_string(item)?;
    let values: Vec<Value> = vec![
        key.partition.into(),
        key.sort.into(),
        attribute(item, keys::GSI1_PK).into(),
        attribute(item, keys::GSI1_SK).into(),
        attribute(item, keys::GSI2_PK).into(),
        attribute(item, keys::GSI2_SK).into(),
        attribute(item, keys::GSI3_PK).into(),
        body.into(),
    ];
    db_tx
        .execute(Statement::from_sql_and_values(
            db_tx.get_database_backend(),
            "INSERT OR REPLACE INTO items \
             (pk, sk, gsi1pk, gsi1sk, gsi2pk, gsi2sk, gsi3pk, body) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?);",
            values,
        ))
        .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn put(&self, item: Item, condition: Condition) -> Result<(), StoreError> {
        let key = PrimaryKey::of(&item)
            .ok_or_else(|| StoreError::Backend("item has no primary key".to_string()))?;
        let db_tx = self.database.begin().await?;
        if condition != Condition::None {
            let existing = current(&db_tx, &key).await?;
            check_condition(&condition, existing.as_ref())?;
        }
        upsert(&db_tx, &item).await?;
        db_tx.commit().await?;
        Ok(())
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, StoreError> {
        let row = self
            .database
            .query_one(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "SELECT body FROM items WHERE pk = ? AND sk = ?;",
                vec![key.partition.clone().into(), key.sort.clone().into()],
            ))
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn delete(&self, key: &PrimaryKey, condition: Condition) -> Result<(), StoreError> {
        let db_tx = self.database.begin().await?;
        if condition != Condition::None {
            let existing = current(&db_tx, key).await?;
            check_condition(&condition, existing.as_ref())?;
        }
        db_tx
            .execute(Statement::from_sql_and_values(
                db_tx.get_database_backend(),
                "DELETE FROM items WHERE pk = ? AND sk = ?;",
                vec![key.partition.clone().into(), key.sort.clone().into()],
            ))
            .await?;
        db_tx.commit().await?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryPage, StoreError> {
        let (partition_col, sort_col) = columns(request.index);
        let (order, cmp) = if request.scan_forward {
            ("ASC", ">")
        } else {
            ("DESC", "<")
        };

        let mut sql = format!("SELECT body FROM items WHERE {partition_col} = ?");
        let mut values: Vec<Value> = vec![request.partition.clone().into()];

        match &request.sort {
            Some(SortKeyCondition::BeginsWith(prefix)) => {
                sql.push_str(&format!(" AND substr({sort_col}, 1, length(?)) = ?"));
                values.push(prefix.clone().into());
                values.push(prefix.clone().into());
            }
            Some(SortKeyCondition::Equals(value)) => {
                sql.push_str(&format!(" AND {sort_col} = ?"));
                values.push(value.clone().into());
            }
            None => {}
        }

        if let Some(start) = &request.exclusive_start {
            let key = PrimaryKey::of(start)
                .ok_or_else(|| StoreError::Backend("start key has no primary key".to_string()))?;
            let (_, sort_attr) = request.index.attributes();
            let start_sort = match sort_attr {
                Some(name) => attribute(start, name).ok_or_else(|| {
                    StoreError::Backend(format!("start key is missing \"{name}\""))
                })?,
                None => String::new(),
            };
            sql.push_str(&format!(" AND ({sort_col}, pk, sk) {cmp} (?, ?, ?)"));
            values.push(start_sort.into());
            values.push(key.partition.into());
            values.push(key.sort.into());
        }

        let limit = request.limit.max(1);
        sql.push_str(&format!(
            " ORDER BY {sort_col} {order}, pk {order}, sk {order} LIMIT ?;"
        ));
        values.push(((limit + 1) as i64).into());

        let rows = self
            .database
            .query_all(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                sql,
                values,
            ))
            .await?;

        let more = rows.len() > limit;
        let items = rows
            .iter()
            .take(limit)
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;
        let last_evaluated = if more {
            items.last().map(|item| key_projection(request.index, item))
        } else {
            None
        };
        Ok(QueryPage {
            items,
            last_evaluated,
        })
    }

    async fn batch_write(&self, items: Vec<Item>) -> Result<Vec<Item>, StoreError> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(StoreError::Backend(format!(
                "batch of {} items exceeds the limit of {MAX_BATCH_ITEMS}",
                items.len()
            )));
        }
        let db_tx = self.database.begin().await?;
        for item in &items {
            upsert(&db_tx, item).await?;
        }
        db_tx.commit().await?;
        Ok(Vec::new())
    }
}
