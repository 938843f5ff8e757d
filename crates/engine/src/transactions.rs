//! Transaction primitives.
//!
//! A `Transaction` is a single income or expense event of one user. Its
//! amount is stored signed according to its kind: income positive, expense
//! negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Month, ResultEngine,
    item::{self, AttributeValue, DecodeError, Item},
    keys::{self, TransactionKeys},
};

pub(crate) const ENTITY_TAG: &str = "transaction";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Give `amount` the sign this kind is stored with.
    pub fn signed(self, amount: f64) -> f64 {
        match self {
            Self::Income => amount.abs(),
            Self::Expense => -amount.abs(),
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::Validation(format!(
                "type must be either income or expense, got \"{other}\""
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency stamp, starting at 1.
    pub version: u64,
}

impl Transaction {
    /// Validated constructor: generates an id, stamps both timestamps and sets
    /// the version to 1.
    pub fn new(
        user_id: impl Into<String>,
        kind: TransactionKind,
        amount: f64,
        category: impl Into<String>,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let now = Utc::now();
        let category: String = category.into();
        let description: String = description.into();
        let tx = Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            date,
            amount: kind.signed(amount),
            description: description.trim().to_string(),
            category: category.trim().to_string(),
            kind,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Check the field invariants. Runs before every write.
    pub fn validate(&self) -> ResultEngine<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Validation("id is required".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(EngineError::Validation("user_id is required".to_string()));
        }
        keys::check_key_part(&self.id, "id")?;
        keys::check_key_part(&self.user_id, "user_id")?;
        if self.amount == 0.0 || !self.amount.is_finite() {
            return Err(EngineError::Validation(
                "amount must be a non-zero number".to_string(),
            ));
        }
        if self.kind.signed(self.amount) != self.amount {
            return Err(EngineError::Validation(format!(
                "amount sign does not match type {}",
                self.kind.as_str()
            )));
        }
        if self.category.trim().is_empty() {
            return Err(EngineError::Validation("category is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(EngineError::Validation(
                "description is required".to_string(),
            ));
        }
        if self.date.timestamp() <= 0 {
            return Err(EngineError::Validation(
                "date is required and must be after 1970-01-01".to_string(),
            ));
        }
        if self.date.timestamp() > keys::MAX_TIMESTAMP {
            return Err(EngineError::Validation(
                "date must not be later than 2286-11-20T17:46:39Z".to_string(),
            ));
        }
        if self.version == 0 {
            return Err(EngineError::Validation("version must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn month(&self) -> Month {
        Month::of(self.date)
    }

    /// Magnitude of the amount regardless of kind.
    pub fn magnitude(&self) -> f64 {
        self.amount.abs()
    }

    pub fn keys(&self) -> TransactionKeys {
        keys::transaction_keys(&self.user_id, &self.id, self.date, &self.category)
    }

    /// Encode as a store item, with every index key derived afresh.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        self.keys().write_to(&mut item);
        item.insert("entity".to_string(), AttributeValue::string(ENTITY_TAG));
        item.insert("id".to_string(), AttributeValue::string(&self.id));
        item.insert("user_id".to_string(), AttributeValue::string(&self.user_id));
        item.insert("date".to_string(), AttributeValue::timestamp(self.date));
        item.insert("amount".to_string(), AttributeValue::number(self.amount));
        item.insert(
            "description".to_string(),
            AttributeValue::string(&self.description),
        );
        item.insert(
            "category".to_string(),
            AttributeValue::string(&self.category),
        );
        item.insert(
            "type".to_string(),
            AttributeValue::string(self.kind.as_str()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::timestamp(self.created_at),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::timestamp(self.updated_at),
        );
        item.insert("version".to_string(), AttributeValue::number(self.version));
        item
    }

    pub fn from_item(item: &Item) -> Result<Self, DecodeError> {
        let kind = item::get_str(item, "type")?;
        let kind = TransactionKind::try_from(kind)
            .map_err(|_| DecodeError::new("type", format!("unknown type \"{kind}\"")))?;
        let version = match item.get("version") {
            // Records written before versioning was introduced.
            None => 1,
            Some(_) => item::get_u64(item, "version")?,
        };
        Ok(Self {
            id: item::get_string(item, "id")?,
            user_id: item::get_string(item, "user_id")?,
            date: item::get_timestamp(item, "date")?,
            amount: item::get_f64(item, "amount")?,
            description: item::get_string(item, "description")?,
            category: item::get_string(item, "category")?,
            kind,
            created_at: item::get_timestamp(item, "created_at")?,
            updated_at: item::get_timestamp(item, "updated_at")?,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_sets_bookkeeping_and_normalizes_sign() {
        let tx = Transaction::new("u1", TransactionKind::Expense, 50.0, "food", "lunch", date())
            .unwrap();
        assert!(!tx.id.is_empty());
        assert_eq!(tx.version, 1);
        assert_eq!(tx.amount, -50.0);
        assert_eq!(tx.created_at, tx.updated_at);

        let tx = Transaction::new("u1", TransactionKind::Income, -10.0, "gift", "aunt", date())
            .unwrap();
        assert_eq!(tx.amount, 10.0);
    }

    #[test]
    fn new_rejects_invalid_fields() {
        let cases = [
            ("", 1.0, "food", "x"),
            ("u1", 0.0, "food", "x"),
            ("u1", f64::NAN, "food", "x"),
            ("u1", 1.0, "  ", "x"),
            ("u1", 1.0, "food", ""),
        ];
        for (user, amount, category, description) in cases {
            let result = Transaction::new(
                user,
                TransactionKind::Expense,
                amount,
                category,
                description,
                date(),
            );
            assert!(matches!(result, Err(EngineError::Validation(_))));
        }

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let result = Transaction::new("u1", TransactionKind::Income, 1.0, "a", "b", epoch);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn ids_with_key_separator_are_rejected() {
        let result = Transaction::new("a#b", TransactionKind::Expense, 1.0, "food", "x", date());
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let mut tx =
            Transaction::new("a", TransactionKind::Expense, 1.0, "food", "x", date()).unwrap();
        tx.id = "b#c".to_string();
        assert!(matches!(tx.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn dates_must_fit_the_ten_digit_stamp() {
        let last = Utc.timestamp_opt(keys::MAX_TIMESTAMP, 0).unwrap();
        let tx = Transaction::new("u1", TransactionKind::Income, 1.0, "a", "b", last).unwrap();
        assert_eq!(tx.keys().by_month.sort, "TX#9999999999");

        let beyond = last + chrono::Duration::seconds(1);
        let result = Transaction::new("u1", TransactionKind::Income, 1.0, "a", "b", beyond);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        assert!(matches!(
            TransactionKind::try_from("transfer"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn item_round_trip_preserves_fields_and_derives_keys() {
        let tx = Transaction::new("u1", TransactionKind::Expense, 50.0, "Food", "lunch", date())
            .unwrap();
        let item = tx.to_item();
        assert_eq!(
            item.get(keys::GSI2_PK),
            Some(&AttributeValue::string("CATEGORY#FOOD#u1"))
        );
        assert_eq!(
            item.get(keys::GSI1_PK),
            Some(&AttributeValue::string("MONTH#2024-01#u1"))
        );

        let decoded = Transaction::from_item(&item).unwrap();
        assert_eq!(decoded.id, tx.id);
        assert_eq!(decoded.amount, -50.0);
        assert_eq!(decoded.kind, TransactionKind::Expense);
        assert_eq!(decoded.date, tx.date);
        assert_eq!(decoded.version, 1);
    }

    #[test]
    fn stale_projections_are_replaced_on_encode() {
        let mut tx =
            Transaction::new("u1", TransactionKind::Expense, 5.0, "food", "x", date()).unwrap();
        tx.category = "travel".to_string();
        let item = tx.to_item();
        assert_eq!(
            item.get(keys::GSI2_PK),
            Some(&AttributeValue::string("CATEGORY#TRAVEL#u1"))
        );
    }

    #[test]
    fn decode_accepts_date_only_and_names_bad_fields() {
        let tx =
            Transaction::new("u1", TransactionKind::Income, 5.0, "salary", "x", date()).unwrap();
        let mut item = tx.to_item();
        item.insert("date".to_string(), AttributeValue::string("2024-01-15"));
        let decoded = Transaction::from_item(&item).unwrap();
        assert_eq!(decoded.date, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());

        item.insert("type".to_string(), AttributeValue::string("refund"));
        assert_eq!(Transaction::from_item(&item).unwrap_err().field, "type");

        let mut item = tx.to_item();
        item.remove("category");
        assert_eq!(Transaction::from_item(&item).unwrap_err().field, "category");
    }
}
