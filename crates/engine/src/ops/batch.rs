use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction,
    item::Item,
    store::MAX_BATCH_ITEMS,
};

use super::{BatchRetry, Engine};

impl Engine {
    /// Bulk-load transactions.
    ///
    /// Every transaction is validated before anything is written. The input is
    /// then written in chunks of [`MAX_BATCH_ITEMS`] with blind overwrite, so
    /// resubmitting an already loaded transaction is harmless. Items the store
    /// leaves unprocessed, or a whole chunk hit by a transient store error, are
    /// resubmitted with linear backoff. A chunk that still has unprocessed items
    /// after the last retry fails the load with `BatchWriteFailed`; chunks
    /// written before it stay written.
    ///
    /// Returns the number of transactions written.
    pub async fn batch_create_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> ResultEngine<usize> {
        let items = transactions
            .into_iter()
            .map(|mut tx| {
                if tx.id.trim().is_empty() {
                    tx.id = Uuid::new_v4().to_string();
                }
                tx.validate()?;
                Ok(tx.to_item())
            })
            .collect::<ResultEngine<Vec<Item>>>()?;

        for (number, chunk) in items.chunks(MAX_BATCH_ITEMS).enumerate() {
            let first = number * MAX_BATCH_ITEMS;
            let last = first + chunk.len() - 1;
            self.write_chunk(chunk.to_vec(), first, last).await?;
            tracing::info!(first, last, "batch chunk committed");
        }
        Ok(items.len())
    }

    async fn write_chunk(
        &self,
        mut pending: Vec<Item>,
        first: usize,
        last: usize,
    ) -> ResultEngine<()> {
        let BatchRetry { max_retries, backoff } = self.batch_retry;
        let mut attempt = 0;
        loop {
            match self.store.batch_write(pending.clone()).await {
                Ok(unprocessed) => pending = unprocessed,
                Err(err) if err.is_transient() => {
                    tracing::warn!(first, last, "transient store error on batch write: {err}");
                }
                Err(err) => return Err(EngineError::store("batch write transactions")(err)),
            }
            if pending.is_empty() {
                return Ok(());
            }
            if attempt >= max_retries {
                return Err(EngineError::BatchWriteFailed {
                    first,
                    last,
                    unprocessed: pending.len(),
                });
            }
            attempt += 1;
            tracing::warn!(
                first,
                last,
                unprocessed = pending.len(),
                attempt,
                "retrying unprocessed batch items"
            );
            tokio::time::sleep(backoff * attempt).await;
        }
    }
}
