use crate::{
    Budget, EngineError, Month, ResultEngine,
    keys,
    store::{Condition, Index, QueryRequest, SortKeyCondition, StoreError},
};

use super::{Engine, decode_all, require};

impl Engine {
    /// Create or overwrite the budget of `category` for `month`.
    ///
    /// Budgets are keyed by month and case-folded category, so the last write
    /// wins and no version check takes place.
    pub async fn set_budget(
        &self,
        user_id: &str,
        month: Month,
        category: &str,
        amount: f64,
    ) -> ResultEngine<Budget> {
        let budget = Budget::new(user_id, month, category, amount)?;
        self.store
            .put(budget.to_item(), Condition::None)
            .await
            .map_err(EngineError::store("set budget"))?;
        tracing::info!(user_id, %month, category, amount, "budget set");
        Ok(budget)
    }

    pub async fn budget(&self, user_id: &str, month: Month, category: &str) -> ResultEngine<Budget> {
        require(user_id, "user_id")?;
        require(category, "category")?;
        let key = keys::budget_key(user_id, month, category);
        let item = self
            .store
            .get(&key)
            .await
            .map_err(EngineError::store("get budget"))?
            .ok_or_else(|| EngineError::NotFound(format!("budget {month} {category}")))?;
        Ok(Budget::from_item(&item)?)
    }

    /// Every budget a user set for `month`, ordered by category.
    pub async fn budgets_by_month(&self, user_id: &str, month: Month) -> ResultEngine<Vec<Budget>> {
        require(user_id, "user_id")?;
        let mut budgets = Vec::new();
        let mut start = None;
        loop {
            let mut request =
                QueryRequest::newest_first(Index::Primary, keys::user_partition(user_id), self.list_limit)
                    .with_sort(SortKeyCondition::BeginsWith(keys::budget_month_prefix(month)))
                    .starting_after(start);
            request.scan_forward = true;
            let page = self
                .store
                .query(request)
                .await
                .map_err(EngineError::store("query budgets"))?;
            budgets.extend(decode_all(page.items, Budget::from_item));
            match page.last_evaluated {
                Some(last) => start = Some(last),
                None => break,
            }
        }
        Ok(budgets)
    }

    pub async fn delete_budget(&self, user_id: &str, month: Month, category: &str) -> ResultEngine<()> {
        require(user_id, "user_id")?;
        require(category, "category")?;
        let key = keys::budget_key(user_id, month, category);
        match self.store.delete(&key, Condition::Exists).await {
            Ok(()) => {
                tracing::info!(user_id, %month, category, "budget deleted");
                Ok(())
            }
            Err(StoreError::ConditionFailed) => {
                Err(EngineError::NotFound(format!("budget {month} {category}")))
            }
            Err(err) => Err(EngineError::store("delete budget")(err)),
        }
    }
}
