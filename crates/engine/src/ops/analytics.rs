use crate::{
    Month, ResultEngine,
    analytics::{
        self, BudgetUtilization, CategoryBreakdown, CategoryOption, FinancialSummary,
        MonthlyAnalytics, MonthlyBudgetReport,
    },
};

use super::Engine;

impl Engine {
    /// Totals for one month of a user.
    pub async fn monthly_analytics(
        &self,
        user_id: &str,
        month: Month,
    ) -> ResultEngine<MonthlyAnalytics> {
        let transactions = self.all_transactions_by_month(user_id, month).await?;
        Ok(analytics::monthly_analytics(month, &transactions))
    }

    /// Totals over the user's whole history.
    pub async fn financial_summary(&self, user_id: &str) -> ResultEngine<FinancialSummary> {
        let transactions = self.all_transactions_by_user(user_id).await?;
        Ok(analytics::financial_summary(&transactions))
    }

    pub async fn monthly_budget_report(
        &self,
        user_id: &str,
        month: Month,
    ) -> ResultEngine<MonthlyBudgetReport> {
        let transactions = self.all_transactions_by_month(user_id, month).await?;
        let budgets = self.budgets_by_month(user_id, month).await?;
        Ok(analytics::monthly_budget_report(
            month,
            &transactions,
            &budgets,
        ))
    }

    pub async fn budget_utilization(
        &self,
        user_id: &str,
        month: Month,
    ) -> ResultEngine<Vec<BudgetUtilization>> {
        let transactions = self.all_transactions_by_month(user_id, month).await?;
        let budgets = self.budgets_by_month(user_id, month).await?;
        Ok(analytics::budget_utilization(month, &transactions, &budgets))
    }

    /// Expense breakdown of one month.
    pub async fn category_breakdown(
        &self,
        user_id: &str,
        month: Month,
    ) -> ResultEngine<Vec<CategoryBreakdown>> {
        let transactions = self.all_transactions_by_month(user_id, month).await?;
        Ok(analytics::category_breakdown(&transactions))
    }

    pub async fn financial_insights(&self, user_id: &str, month: Month) -> ResultEngine<Vec<String>> {
        let monthly = self.monthly_analytics(user_id, month).await?;
        Ok(analytics::insights(&monthly))
    }

    pub async fn unique_categories(&self, user_id: &str) -> ResultEngine<Vec<String>> {
        let transactions = self.all_transactions_by_user(user_id).await?;
        Ok(analytics::unique_categories(&transactions))
    }

    pub async fn category_options(&self, user_id: &str) -> ResultEngine<Vec<CategoryOption>> {
        let transactions = self.all_transactions_by_user(user_id).await?;
        Ok(analytics::category_options(&transactions))
    }

    /// Months holding at least one transaction, most recent first.
    pub async fn months_with_transactions(&self, user_id: &str) -> ResultEngine<Vec<Month>> {
        let transactions = self.all_transactions_by_user(user_id).await?;
        Ok(analytics::months_with_transactions(&transactions))
    }
}
