use chrono::Utc;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction,
    item::AttributeValue,
    keys,
    store::{Condition, Index, QueryRequest, SortKeyCondition, StoreError},
};

use super::{Engine, decode_all, require};

fn version_is(version: u64) -> Condition {
    Condition::Equals {
        attribute: "version".to_string(),
        value: AttributeValue::number(version),
    }
}

impl Engine {
    /// Store a new transaction. Fails with `AlreadyExists` when a record with
    /// the same primary key is present.
    ///
    /// A missing id is generated; the version always starts at 1.
    pub async fn create_transaction(&self, mut tx: Transaction) -> ResultEngine<Transaction> {
        if tx.id.trim().is_empty() {
            tx.id = Uuid::new_v4().to_string();
        }
        tx.version = 1;
        tx.validate()?;

        match self.store.put(tx.to_item(), Condition::NotExists).await {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(EngineError::AlreadyExists(format!("transaction {}", tx.id)));
            }
            Err(err) => return Err(EngineError::store("create transaction")(err)),
        }
        tracing::info!(user_id = %tx.user_id, id = %tx.id, "transaction created");
        Ok(tx)
    }

    pub async fn transaction(&self, user_id: &str, id: &str) -> ResultEngine<Transaction> {
        require(user_id, "user_id")?;
        require(id, "id")?;
        self.locate(user_id, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("transaction {id}")))
    }

    /// Find a transaction by its logical id.
    ///
    /// The by-id index answers directly. Records written before that index
    /// existed are found by scanning the user's partition, bounded by the list
    /// limit.
    async fn locate(&self, user_id: &str, id: &str) -> ResultEngine<Option<Transaction>> {
        let page = self
            .store
            .query(QueryRequest::newest_first(
                Index::ById,
                keys::id_partition(user_id, id),
                2,
            ))
            .await
            .map_err(EngineError::store("get transaction"))?;
        // Mid-move an update can briefly leave two records under one id.
        let found = decode_all(page.items, Transaction::from_item)
            .into_iter()
            .filter(|tx| tx.user_id == user_id && tx.id == id)
            .max_by_key(|tx| tx.version);
        if found.is_some() {
            return Ok(found);
        }

        tracing::debug!(user_id, id, "id index miss, scanning user partition");
        let page = self
            .store
            .query(
                QueryRequest::newest_first(
                    Index::Primary,
                    keys::user_partition(user_id),
                    self.list_limit,
                )
                .with_sort(SortKeyCondition::BeginsWith(
                    keys::TRANSACTION_PREFIX.to_string(),
                )),
            )
            .await
            .map_err(EngineError::store("get transaction"))?;
        let matching = page
            .items
            .into_iter()
            .filter(|item| item.get("id").and_then(|v| v.as_str()) == Some(id))
            .collect();
        Ok(decode_all(matching, Transaction::from_item)
            .into_iter()
            .find(|tx| tx.user_id == user_id))
    }

    /// Replace a transaction using optimistic concurrency.
    ///
    /// `tx.version` must equal the stored version, otherwise `Conflict` is
    /// returned and nothing is written. On success the stored version is
    /// incremented and the updated record returned. Callers that hit
    /// `Conflict` re-read and resubmit.
    pub async fn update_transaction(&self, tx: Transaction) -> ResultEngine<Transaction> {
        tx.validate()?;
        let existing = self.transaction(&tx.user_id, &tx.id).await?;
        if existing.version != tx.version {
            return Err(EngineError::Conflict(format!("transaction {}", tx.id)));
        }

        let mut next = tx;
        next.created_at = existing.created_at;
        next.updated_at = Utc::now();
        next.version = existing.version + 1;

        let old_key = existing.keys().primary;
        let new_key = next.keys().primary;
        if old_key == new_key {
            self.store
                .put(next.to_item(), version_is(existing.version))
                .await
                .map_err(|err| conflict_or(err, &next.id, "update transaction"))?;
        } else {
            // The date moved, so does the primary key: write the new record
            // first, then retire the old one on its version.
            self.store
                .put(next.to_item(), Condition::NotExists)
                .await
                .map_err(|err| conflict_or(err, &next.id, "update transaction"))?;
            if let Err(err) = self
                .store
                .delete(&old_key, version_is(existing.version))
                .await
            {
                if let Err(undo) = self.store.delete(&new_key, Condition::None).await {
                    tracing::warn!(id = %next.id, "cannot remove moved record after failed update: {undo}");
                }
                return Err(conflict_or(err, &next.id, "update transaction"));
            }
        }

        tracing::info!(user_id = %next.user_id, id = %next.id, version = next.version, "transaction updated");
        Ok(next)
    }

    /// Delete a transaction by logical id. `NotFound` when absent.
    pub async fn delete_transaction(&self, user_id: &str, id: &str) -> ResultEngine<()> {
        let existing = self.transaction(user_id, id).await?;
        match self
            .store
            .delete(&existing.keys().primary, Condition::Exists)
            .await
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(EngineError::NotFound(format!("transaction {id}")));
            }
            Err(err) => return Err(EngineError::store("delete transaction")(err)),
        }
        tracing::info!(user_id, id, "transaction deleted");
        Ok(())
    }
}

fn conflict_or(err: StoreError, id: &str, context: &'static str) -> EngineError {
    match err {
        StoreError::ConditionFailed => EngineError::Conflict(format!("transaction {id}")),
        other => EngineError::store(context)(other),
    }
}
