use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Condition, DocumentStore, Index, MAX_BATCH_ITEMS, QueryPage, QueryRequest, StoreError,
    check_condition, key_projection,
};
use crate::{item::Item, keys::PrimaryKey};

/// In-process store backed by an ordered map. Used by tests and the
/// `memory` store kind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<PrimaryKey, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

/// Position of an item within an index: index sort key, then primary key.
type Position = (String, String, String);

fn position(index: Index, item: &Item) -> Option<Position> {
    let (_, sort_attr) = index.attributes();
    let key = PrimaryKey::of(item)?;
    let sort = match sort_attr {
        Some(name) => item.get(name)?.as_str()?.to_string(),
        None => String::new(),
    };
    Some((sort, key.partition, key.sort))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, item: Item, condition: Condition) -> Result<(), StoreError> {
        let key = PrimaryKey::of(&item)
            .ok_or_else(|| StoreError::Backend("item has no primary key".to_string()))?;
        let mut items = self.items.write().await;
        check_condition(&condition, items.get(&key))?;
        items.insert(key, item);
        Ok(())
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, StoreError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &PrimaryKey, condition: Condition) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        check_condition(&condition, items.get(key))?;
        items.remove(key);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryPage, StoreError> {
        let (partition_attr, _) = request.index.attributes();
        let items = self.items.read().await;

        let mut matching: Vec<(Position, &Item)> = items
            .values()
            .filter(|item| {
                item.get(partition_attr).and_then(|v| v.as_str()) == Some(request.partition.as_str())
            })
            .filter_map(|item| position(request.index, item).map(|pos| (pos, item)))
            .filter(|(pos, _)| request.sort.as_ref().is_none_or(|cond| cond.matches(&pos.0)))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));
        if !request.scan_forward {
            matching.reverse();
        }

        let start = request
            .exclusive_start
            .as_ref()
            .and_then(|item| position(request.index, item));
        let remaining: Vec<&Item> = matching
            .into_iter()
            .filter(|(pos, _)| match &start {
                None => true,
                Some(start) if request.scan_forward => pos > start,
                Some(start) => pos < start,
            })
            .map(|(_, item)| item)
            .collect();

        let limit = request.limit.max(1);
        let more = remaining.len() > limit;
        let page: Vec<Item> = remaining.into_iter().take(limit).cloned().collect();
        let last_evaluated = if more {
            page.last().map(|item| key_projection(request.index, item))
        } else {
            None
        };
        Ok(QueryPage {
            items: page,
            last_evaluated,
        })
    }

    async fn batch_write(&self, batch: Vec<Item>) -> Result<Vec<Item>, StoreError> {
        if batch.len() > MAX_BATCH_ITEMS {
            return Err(StoreError::Backend(format!(
                "batch of {} items exceeds the limit of {MAX_BATCH_ITEMS}",
                batch.len()
            )));
        }
        let mut items = self.items.write().await;
        for item in batch {
            let key = PrimaryKey::of(&item)
                .ok_or_else(|| StoreError::Backend("item has no primary key".to_string()))?;
            items.insert(key, item);
        }
        Ok(Vec::new())
    }
}
