//! User profile record. Created once, rarely mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    item::{self, AttributeValue, DecodeError, Item},
    keys::{self, PrimaryKey},
};

pub(crate) const ENTITY_TAG: &str = "user";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> ResultEngine<Self> {
        Self::with_id(Uuid::new_v4().to_string(), email, name)
    }

    pub fn with_id(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> ResultEngine<Self> {
        let now = Utc::now();
        let email: String = email.into();
        let name: String = name.into();
        let user = Self {
            id: id.into(),
            email: email.trim().to_string(),
            name: name.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        if user.id.trim().is_empty() {
            return Err(EngineError::Validation("id is required".to_string()));
        }
        keys::check_key_part(&user.id, "id")?;
        if !user.email.contains('@') {
            return Err(EngineError::Validation(format!(
                "invalid email \"{}\"",
                user.email
            )));
        }
        if user.name.is_empty() {
            return Err(EngineError::Validation("name is required".to_string()));
        }
        Ok(user)
    }

    pub fn key(&self) -> PrimaryKey {
        keys::profile_key(&self.id)
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        self.key().write_to(&mut item);
        item.insert("entity".to_string(), AttributeValue::string(ENTITY_TAG));
        item.insert("id".to_string(), AttributeValue::string(&self.id));
        item.insert("email".to_string(), AttributeValue::string(&self.email));
        item.insert("name".to_string(), AttributeValue::string(&self.name));
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
        Ok(Self {
            id: item::get_string(item, "id")?,
            email: item::get_string(item, "email")?,
            name: item::get_string(item, "name")?,
            created_at: item::get_timestamp(item, "created_at")?,
            updated_at: item::get_timestamp(item, "updated_at")?,
        })
    }
}
