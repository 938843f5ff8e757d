//! Key Builder for the single-table layout.
//!
//! One physical table answers every access pattern. Each record carries its
//! primary key plus the derived keys of the secondary indexes it appears in:
//!
//! | Record      | `PK`             | `SK`                           | by month (`GSI1`)                     | by category (`GSI2`)                        | by id (`GSI3`)       |
//! |-------------|------------------|--------------------------------|---------------------------------------|---------------------------------------------|----------------------|
//! | transaction | `USER#{user}`    | `TX#{unix}#{id}`               | `MONTH#{YYYY-MM}#{user}` / `TX#{unix}` | `CATEGORY#{CATEGORY}#{user}` / `TX#{unix}`  | `TXID#{user}#{id}`   |
//! | budget      | `USER#{user}`    | `BUDGET#{YYYY-MM}#{CATEGORY}`  |                                       |                                             |                      |
//! | user        | `USER#{user}`    | `PROFILE`                      |                                       |                                             |                      |
//!
//! `{unix}` is whole seconds since the epoch, zero-padded to ten digits so
//! lexicographic order within a partition is chronological order. Dates past
//! [`MAX_TIMESTAMP`] would need an eleventh digit and are rejected.
//!
//! User ids and transaction ids may not contain `#`: both are embedded in
//! keys next to other parts.
//!
//! Derived keys are never read back as authoritative: they are recomputed from
//! the entity fields on every write.

use chrono::{DateTime, Utc};

use crate::{
    EngineError, Month, ResultEngine,
    item::{AttributeValue, Item},
};

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1_PK: &str = "GSI1PK";
pub const GSI1_SK: &str = "GSI1SK";
pub const GSI2_PK: &str = "GSI2PK";
pub const GSI2_SK: &str = "GSI2SK";
pub const GSI3_PK: &str = "GSI3PK";

pub const SEPARATOR: char = '#';
/// Last second whose stamp still fits in ten digits (2286-11-20).
pub const MAX_TIMESTAMP: i64 = 9_999_999_999;

pub(crate) const TRANSACTION_PREFIX: &str = "TX#";
pub(crate) const BUDGET_PREFIX: &str = "BUDGET#";
pub(crate) const PROFILE_SORT: &str = "PROFILE";

/// The two-part primary key of a record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimaryKey {
    pub partition: String,
    pub sort: String,
}

impl PrimaryKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Read the primary key attributes of a stored item.
    pub fn of(item: &Item) -> Option<Self> {
        let partition = item.get(PK)?.as_str()?;
        let sort = item.get(SK)?.as_str()?;
        Some(Self::new(partition, sort))
    }

    pub(crate) fn write_to(&self, item: &mut Item) {
        item.insert(PK.to_string(), AttributeValue::string(&self.partition));
        item.insert(SK.to_string(), AttributeValue::string(&self.sort));
    }
}

/// Every key a transaction record is written with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionKeys {
    pub primary: PrimaryKey,
    pub by_month: PrimaryKey,
    pub by_category: PrimaryKey,
    pub by_id: String,
}

impl TransactionKeys {
    pub(crate) fn write_to(&self, item: &mut Item) {
        self.primary.write_to(item);
        item.insert(
            GSI1_PK.to_string(),
            AttributeValue::string(&self.by_month.partition),
        );
        item.insert(
            GSI1_SK.to_string(),
            AttributeValue::string(&self.by_month.sort),
        );
        item.insert(
            GSI2_PK.to_string(),
            AttributeValue::string(&self.by_category.partition),
        );
        item.insert(
            GSI2_SK.to_string(),
            AttributeValue::string(&self.by_category.sort),
        );
        item.insert(GSI3_PK.to_string(), AttributeValue::string(&self.by_id));
    }
}

/// Derive the full key set of a transaction from its fields.
pub fn transaction_keys(
    user_id: &str,
    id: &str,
    date: DateTime<Utc>,
    category: &str,
) -> TransactionKeys {
    let stamp = date_stamp(date);
    TransactionKeys {
        primary: PrimaryKey::new(
            user_partition(user_id),
            format!("{TRANSACTION_PREFIX}{stamp}#{id}"),
        ),
        by_month: PrimaryKey::new(
            month_partition(user_id, Month::of(date)),
            format!("{TRANSACTION_PREFIX}{stamp}"),
        ),
        by_category: PrimaryKey::new(
            category_partition(user_id, category),
            format!("{TRANSACTION_PREFIX}{stamp}"),
        ),
        by_id: id_partition(user_id, id),
    }
}

pub fn user_partition(user_id: &str) -> String {
    format!("USER#{user_id}")
}

pub fn month_partition(user_id: &str, month: Month) -> String {
    format!("MONTH#{month}#{user_id}")
}

pub fn category_partition(user_id: &str, category: &str) -> String {
    format!("CATEGORY#{}#{user_id}", normalize_category(category))
}

pub fn id_partition(user_id: &str, id: &str) -> String {
    format!("TXID#{user_id}#{id}")
}

pub fn budget_key(user_id: &str, month: Month, category: &str) -> PrimaryKey {
    PrimaryKey::new(
        user_partition(user_id),
        format!("{BUDGET_PREFIX}{month}#{}", normalize_category(category)),
    )
}

pub fn budget_month_prefix(month: Month) -> String {
    format!("{BUDGET_PREFIX}{month}#")
}

pub fn profile_key(user_id: &str) -> PrimaryKey {
    PrimaryKey::new(user_partition(user_id), PROFILE_SORT)
}

/// Reject an identifier that would make a composite key ambiguous.
pub(crate) fn check_key_part(value: &str, label: &str) -> ResultEngine<()> {
    if value.contains(SEPARATOR) {
        return Err(EngineError::Validation(format!(
            "{label} must not contain '{SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Case-fold a category for use inside a key.
pub fn normalize_category(category: &str) -> String {
    category.trim().to_uppercase()
}

fn date_stamp(date: DateTime<Utc>) -> String {
    format!("{:010}", date.timestamp())
}
