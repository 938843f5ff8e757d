//! Monthly per-category budgets.
//!
//! There is at most one budget per `(user, month, category)`; writing it again
//! overwrites the previous value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Month, ResultEngine,
    item::{self, AttributeValue, DecodeError, Item},
    keys::{self, PrimaryKey},
};

pub(crate) const ENTITY_TAG: &str = "budget";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub month: Month,
    pub category: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        user_id: impl Into<String>,
        month: Month,
        category: impl Into<String>,
        amount: f64,
    ) -> ResultEngine<Self> {
        let now = Utc::now();
        let category: String = category.into();
        let budget = Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            month,
            category: category.trim().to_string(),
            amount,
            created_at: now,
            updated_at: now,
        };
        budget.validate()?;
        Ok(budget)
    }

    pub fn validate(&self) -> ResultEngine<()> {
        if self.user_id.trim().is_empty() {
            return Err(EngineError::Validation("user_id is required".to_string()));
        }
        keys::check_key_part(&self.user_id, "user_id")?;
        if self.category.trim().is_empty() {
            return Err(EngineError::Validation("category is required".to_string()));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(EngineError::Validation(
                "budget amount cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn key(&self) -> PrimaryKey {
        keys::budget_key(&self.user_id, self.month, &self.category)
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        self.key().write_to(&mut item);
        item.insert("entity".to_string(), AttributeValue::string(ENTITY_TAG));
        item.insert("id".to_string(), AttributeValue::string(&self.id));
        item.insert("user_id".to_string(), AttributeValue::string(&self.user_id));
        item.insert(
            "month".to_string(),
            AttributeValue::string(self.month.to_string()),
        );
        item.insert(
            "category".to_string(),
            AttributeValue::string(&self.category),
        );
        item.insert("amount".to_string(), AttributeValue::number(self.amount));
        item.insert(
            "created_at".to_string(),
            AttributeValue::timestamp(self.created_at),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::timestamp(self.updated_at),
        );
        item
    }

    pub fn from_item(item: &Item) -> Result<Self, DecodeError> {
        let month = item::get_str(item, "month")?;
        let month = month
            .parse::<Month>()
            .map_err(|err| DecodeError::new("month", err.to_string()))?;
        Ok(Self {
            id: item::get_string(item, "id")?,
            user_id: item::get_string(item, "user_id")?,
            month,
            category: item::get_string(item, "category")?,
            amount: item::get_f64(item, "amount")?,
            created_at: item::get_timestamp(item, "created_at")?,
            updated_at: item::get_timestamp(item, "updated_at")?,
        })
    }
}
