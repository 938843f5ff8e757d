use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Month, ResultEngine, Transaction,
    item::Item,
    keys,
    store::{Index, QueryRequest, SortKeyCondition},
};

use super::{Engine, decode_all, require};

/// One page of a reverse-chronological listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque token resuming the listing after the last item; `None` on the
    /// final page.
    pub next_cursor: Option<String>,
}

/// Continuation state carried between pages: the index being walked and the
/// key of the last item returned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Cursor {
    index: Index,
    last_key: Item,
}

impl Cursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("cannot encode cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("cursor is not valid base64".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("cursor is malformed".to_string()))
    }

    /// Decode a caller-supplied cursor and check it belongs to this listing.
    fn resume(input: Option<&str>, index: Index, partition: &str) -> ResultEngine<Option<Item>> {
        let Some(input) = input.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let cursor = Self::decode(input)?;
        if cursor.index != index {
            return Err(EngineError::InvalidCursor(
                "cursor belongs to a different listing".to_string(),
            ));
        }
        let (partition_attr, _) = index.attributes();
        if cursor.last_key.get(partition_attr).and_then(|v| v.as_str()) != Some(partition) {
            return Err(EngineError::InvalidCursor(
                "cursor belongs to a different partition".to_string(),
            ));
        }
        Ok(Some(cursor.last_key))
    }
}

impl Engine {
    /// Transactions of a user, newest first.
    pub async fn transactions_by_user(
        &self,
        user_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> ResultEngine<Page<Transaction>> {
        require(user_id, "user_id")?;
        self.transaction_page(Index::Primary, keys::user_partition(user_id), limit, cursor)
            .await
    }

    /// Transactions of a user dated within `month` (UTC), newest first.
    pub async fn transactions_by_month(
        &self,
        user_id: &str,
        month: Month,
        limit: usize,
        cursor: Option<&str>,
    ) -> ResultEngine<Page<Transaction>> {
        require(user_id, "user_id")?;
        self.transaction_page(
            Index::ByMonth,
            keys::month_partition(user_id, month),
            limit,
            cursor,
        )
        .await
    }

    /// Transactions of a user in `category`, newest first. The category is
    /// matched case-insensitively.
    pub async fn transactions_by_category(
        &self,
        user_id: &str,
        category: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> ResultEngine<Page<Transaction>> {
        require(user_id, "user_id")?;
        require(category, "category")?;
        self.transaction_page(
            Index::ByCategory,
            keys::category_partition(user_id, category),
            limit,
            cursor,
        )
        .await
    }

    /// Every transaction of a user, following cursors to the end.
    pub async fn all_transactions_by_user(&self, user_id: &str) -> ResultEngine<Vec<Transaction>> {
        require(user_id, "user_id")?;
        self.drain(Index::Primary, keys::user_partition(user_id))
            .await
    }

    /// Every transaction of a user within `month`, following cursors to the end.
    pub async fn all_transactions_by_month(
        &self,
        user_id: &str,
        month: Month,
    ) -> ResultEngine<Vec<Transaction>> {
        require(user_id, "user_id")?;
        self.drain(Index::ByMonth, keys::month_partition(user_id, month))
            .await
    }

    async fn transaction_page(
        &self,
        index: Index,
        partition: String,
        limit: usize,
        cursor: Option<&str>,
    ) -> ResultEngine<Page<Transaction>> {
        let start = Cursor::resume(cursor, index, &partition)?;
        let limit = self.page_size(limit);
        tracing::debug!(?index, %partition, limit, resumed = start.is_some(), "query transactions");

        let request = QueryRequest::newest_first(index, partition, limit)
            .with_sort(SortKeyCondition::BeginsWith(
                keys::TRANSACTION_PREFIX.to_string(),
            ))
            .starting_after(start);
        let page = self
            .store
            .query(request)
            .await
            .map_err(EngineError::store("query transactions"))?;

        let next_cursor = page
            .last_evaluated
            .map(|last_key| Cursor { index, last_key }.encode())
            .transpose()?;
        Ok(Page {
            items: decode_all(page.items, Transaction::from_item),
            next_cursor,
        })
    }

    async fn drain(&self, index: Index, partition: String) -> ResultEngine<Vec<Transaction>> {
        let mut all = Vec::new();
        let mut start = None;
        loop {
            let request = QueryRequest::newest_first(index, partition.clone(), self.list_limit)
                .with_sort(SortKeyCondition::BeginsWith(
                    keys::TRANSACTION_PREFIX.to_string(),
                ))
                .starting_after(start);
            let page = self
                .store
                .query(request)
                .await
                .map_err(EngineError::store("query transactions"))?;
            all.extend(decode_all(page.items, Transaction::from_item));
            match page.last_evaluated {
                Some(last) => start = Some(last),
                None => break,
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::AttributeValue;

    fn last_key(partition: &str) -> Item {
        let mut item = Item::new();
        item.insert(keys::GSI1_PK.to_string(), AttributeValue::string(partition));
        item.insert(keys::GSI1_SK.to_string(), AttributeValue::string("TX#1"));
        item
    }

    #[test]
    fn cursor_round_trip() {
        let cursor = Cursor {
            index: Index::ByMonth,
            last_key: last_key("MONTH#2024-01#u1"),
        };
        let token = cursor.encode().unwrap();
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
        assert_eq!(
            Cursor::resume(Some(&token), Index::ByMonth, "MONTH#2024-01#u1").unwrap(),
            Some(cursor.last_key)
        );
    }

    #[test]
    fn foreign_or_garbled_cursors_are_rejected() {
        let token = Cursor {
            index: Index::ByMonth,
            last_key: last_key("MONTH#2024-01#u1"),
        }
        .encode()
        .unwrap();
        assert!(matches!(
            Cursor::resume(Some(&token), Index::ByCategory, "MONTH#2024-01#u1"),
            Err(EngineError::InvalidCursor(_))
        ));
        assert!(matches!(
            Cursor::resume(Some(&token), Index::ByMonth, "MONTH#2024-01#u2"),
            Err(EngineError::InvalidCursor(_))
        ));
        assert!(matches!(
            Cursor::resume(Some("%%%"), Index::ByMonth, "x"),
            Err(EngineError::InvalidCursor(_))
        ));
        assert_eq!(Cursor::resume(Some(""), Index::ByMonth, "x").unwrap(), None);
    }
}
