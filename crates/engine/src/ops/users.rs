use crate::{
    EngineError, ResultEngine, User, keys,
    store::{Condition, StoreError},
};

use super::{Engine, require};

impl Engine {
    /// Store a new user profile; `AlreadyExists` if the id is taken.
    pub async fn create_user(&self, user: User) -> ResultEngine<User> {
        match self.store.put(user.to_item(), Condition::NotExists).await {
            Ok(()) => {
                tracing::info!(id = %user.id, "user created");
                Ok(user)
            }
            Err(StoreError::ConditionFailed) => {
                Err(EngineError::AlreadyExists(format!("user {}", user.id)))
            }
            Err(err) => Err(EngineError::store("create user")(err)),
        }
    }

    pub async fn user(&self, user_id: &str) -> ResultEngine<User> {
        require(user_id, "user_id")?;
        let item = self
            .store
            .get(&keys::profile_key(user_id))
            .await
            .map_err(EngineError::store("get user"))?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))?;
        Ok(User::from_item(&item)?)
    }
}
