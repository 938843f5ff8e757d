//! Document store port.
//!
//! The engine talks to storage only through [`DocumentStore`]: conditional
//! single-item writes, point reads, index queries with an exclusive start key,
//! and unconditional batch writes that may leave items unprocessed.

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

use crate::{
    item::{AttributeValue, Item},
    keys::{self, PrimaryKey},
};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Most items a single `batch_write` call accepts.
pub const MAX_BATCH_ITEMS: usize = 25;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("conditional check failed")]
    ConditionFailed,
    #[error("throughput exceeded: {0}")]
    Throttled(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Timeout(_))
    }
}

/// Precondition attached to a single-item write.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    None,
    /// No item exists under the key.
    NotExists,
    /// An item exists under the key.
    Exists,
    /// An item exists and its `attribute` equals `value`.
    Equals {
        attribute: String,
        value: AttributeValue,
    },
}

/// Access path of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Index {
    Primary,
    ByMonth,
    ByCategory,
    ById,
}

impl Index {
    /// Attribute names of this index's partition and sort keys.
    ///
    /// The by-id index has no sort key; items in it order by primary key.
    pub fn attributes(self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::Primary => (keys::PK, Some(keys::SK)),
            Self::ByMonth => (keys::GSI1_PK, Some(keys::GSI1_SK)),
            Self::ByCategory => (keys::GSI2_PK, Some(keys::GSI2_SK)),
            Self::ById => (keys::GSI3_PK, None),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SortKeyCondition {
    BeginsWith(String),
    Equals(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort: &str) -> bool {
        match self {
            Self::BeginsWith(prefix) => sort.starts_with(prefix.as_str()),
            Self::Equals(value) => sort == value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    pub index: Index,
    pub partition: String,
    pub sort: Option<SortKeyCondition>,
    pub scan_forward: bool,
    pub limit: usize,
    /// Last item of the previous page; the query resumes strictly after it.
    pub exclusive_start: Option<Item>,
}

impl QueryRequest {
    /// Newest-first query of one partition.
    pub fn newest_first(index: Index, partition: impl Into<String>, limit: usize) -> Self {
        Self {
            index,
            partition: partition.into(),
            sort: None,
            scan_forward: false,
            limit,
            exclusive_start: None,
        }
    }

    pub fn with_sort(mut self, sort: SortKeyCondition) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn starting_after(mut self, item: Option<Item>) -> Self {
        self.exclusive_start = item;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Key attributes of the last returned item, set only when more matching
    /// items remain.
    pub last_evaluated: Option<Item>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, item: Item, condition: Condition) -> Result<(), StoreError>;

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, StoreError>;

    async fn delete(&self, key: &PrimaryKey, condition: Condition) -> Result<(), StoreError>;

    async fn query(&self, request: QueryRequest) -> Result<QueryPage, StoreError>;

    /// Blind-overwrite up to [`MAX_BATCH_ITEMS`] items. Returns the items the
    /// store did not process; they may be resubmitted.
    async fn batch_write(&self, items: Vec<Item>) -> Result<Vec<Item>, StoreError>;
}

/// Evaluate a write precondition against the current item under the key.
pub(crate) fn check_condition(
    condition: &Condition,
    current: Option<&Item>,
) -> Result<(), StoreError> {
    let holds = match condition {
        Condition::None => true,
        Condition::NotExists => current.is_none(),
        Condition::Exists => current.is_some(),
        Condition::Equals { attribute, value } => {
            current.and_then(|item| item.get(attribute)) == Some(value)
        }
    };
    if holds {
        Ok(())
    } else {
        Err(StoreError::ConditionFailed)
    }
}

/// Project the key attributes of `item` that a query over `index` resumes from.
pub(crate) fn key_projection(index: Index, item: &Item) -> Item {
    let (partition, sort) = index.attributes();
    let mut names = vec![keys::PK, keys::SK, partition];
    names.extend(sort);
    names
        .into_iter()
        .filter_map(|name| item.get(name).map(|value| (name.to_string(), value.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_evaluate_against_current_item() {
        let mut item = Item::new();
        item.insert("version".to_string(), AttributeValue::number(2));

        assert!(check_condition(&Condition::NotExists, None).is_ok());
        assert!(check_condition(&Condition::NotExists, Some(&item)).is_err());
        assert!(check_condition(&Condition::Exists, None).is_err());

        let equals = |v: u64| Condition::Equals {
            attribute: "version".to_string(),
            value: AttributeValue::number(v),
        };
        assert!(check_condition(&equals(2), Some(&item)).is_ok());
        assert!(matches!(
            check_condition(&equals(1), Some(&item)),
            Err(StoreError::ConditionFailed)
        ));
        assert!(check_condition(&equals(2), None).is_err());
    }

    #[test]
    fn transient_errors() {
        assert!(StoreError::Throttled("x".to_string()).is_transient());
        assert!(StoreError::Timeout("x".to_string()).is_transient());
        assert!(!StoreError::ConditionFailed.is_transient());
        assert!(!StoreError::Backend("x".to_string()).is_transient());
    }
}
