//! Aggregation over already-fetched transactions.
//!
//! Everything here is pure and order-independent: only sums, counts and
//! maxima are taken. Expense figures are reported as positive magnitudes.
//! Categories are grouped case-insensitively, like the category index, and
//! displayed with the alphabetically first spelling seen.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{Budget, Month, Transaction, TransactionKind, keys::normalize_category};

/// Income, expense and balance of a set of transactions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    pub income: f64,
    /// Sum of expense magnitudes.
    pub expense: f64,
    pub balance: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    /// Total spent in the category.
    pub amount: f64,
    /// Share of total expense, 0 when there is no expense.
    pub percentage: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyAnalytics {
    pub month: Month,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    /// Signed net amount per category: income positive, expense negative.
    pub category_totals: BTreeMap<String, f64>,
    pub transaction_count: usize,
}

/// Totals over every transaction handed in, not a single month.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    /// Balance as a percentage of income, 0 without income.
    pub savings_rate: f64,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub transaction_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryBudgetLine {
    pub category: String,
    pub spent: f64,
    /// 0 when the category has no budget.
    pub budget: f64,
    /// `budget - spent`; negative on overrun.
    pub remaining: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyBudgetReport {
    pub month: Month,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub categories: Vec<CategoryBudgetLine>,
    pub transaction_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BudgetUtilization {
    pub category: String,
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
    /// Share of the budget spent, 0 when the budget is 0.
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryOption {
    pub label: String,
    pub value: String,
}

/// `part / whole * 100`, or 0 when `whole` is not positive.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

pub fn totals<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Totals {
    let mut totals = Totals::default();
    for tx in transactions {
        match tx.kind {
            TransactionKind::Income => totals.income += tx.magnitude(),
            TransactionKind::Expense => totals.expense += tx.magnitude(),
        }
        totals.count += 1;
    }
    totals.balance = totals.income - totals.expense;
    totals
}

/// Groups values by case-folded category, remembering a display name.
#[derive(Default)]
struct Grouped<T> {
    groups: BTreeMap<String, (String, T)>,
}

impl<T: Default> Grouped<T> {
    fn entry(&mut self, category: &str) -> &mut T {
        let (name, value) = self
            .groups
            .entry(normalize_category(category))
            .or_insert_with(|| (category.to_string(), T::default()));
        if category < name.as_str() {
            *name = category.to_string();
        }
        value
    }

    fn into_named(self) -> impl Iterator<Item = (String, String, T)> {
        self.groups
            .into_iter()
            .map(|(key, (name, value))| (key, name, value))
    }
}

fn expense_by_category<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Grouped<(f64, usize)> {
    let mut grouped = Grouped::default();
    for tx in transactions {
        if tx.kind == TransactionKind::Expense {
            let (amount, count) = grouped.entry(&tx.category);
            *amount += tx.magnitude();
            *count += 1;
        }
    }
    grouped
}

/// Expense per category with its share of total expense, ordered by name.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryBreakdown> {
    let total_expense = totals(transactions).expense;
    let mut breakdown: Vec<CategoryBreakdown> = expense_by_category(transactions)
        .into_named()
        .map(|(_, category, (amount, count))| CategoryBreakdown {
            category,
            amount,
            percentage: percentage(amount, total_expense),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| a.category.cmp(&b.category));
    breakdown
}

pub fn monthly_analytics(month: Month, transactions: &[Transaction]) -> MonthlyAnalytics {
    let in_month: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| month.contains(tx.date))
        .collect();
    let totals = totals(in_month.iter().copied());
    let mut grouped: Grouped<f64> = Grouped::default();
    for tx in &in_month {
        *grouped.entry(&tx.category) += tx.amount;
    }
    MonthlyAnalytics {
        month,
        total_income: totals.income,
        total_expense: totals.expense,
        balance: totals.balance,
        category_totals: grouped
            .into_named()
            .map(|(_, name, amount)| (name, amount))
            .collect(),
        transaction_count: totals.count,
    }
}

pub fn financial_summary(transactions: &[Transaction]) -> FinancialSummary {
    let totals = totals(transactions);
    FinancialSummary {
        total_income: totals.income,
        total_expense: totals.expense,
        balance: totals.balance,
        savings_rate: percentage(totals.balance, totals.income),
        category_breakdown: category_breakdown(transactions),
        transaction_count: totals.count,
    }
}

/// Month totals joined with the month's budgets. Every category that was
/// either budgeted or spent in appears once.
pub fn monthly_budget_report(
    month: Month,
    transactions: &[Transaction],
    budgets: &[Budget],
) -> MonthlyBudgetReport {
    let in_month: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| month.contains(tx.date))
        .cloned()
        .collect();
    let totals = totals(&in_month);

    let mut lines: Grouped<(f64, f64)> = Grouped::default();
    for (_, name, (spent, _)) in expense_by_category(&in_month).into_named() {
        lines.entry(&name).0 = spent;
    }
    for budget in budgets.iter().filter(|b| b.month == month) {
        lines.entry(&budget.category).1 = budget.amount;
    }

    let mut categories: Vec<CategoryBudgetLine> = lines
        .into_named()
        .map(|(_, category, (spent, budget))| CategoryBudgetLine {
            category,
            spent,
            budget,
            remaining: budget - spent,
        })
        .collect();
    categories.sort_by(|a, b| a.category.cmp(&b.category));

    MonthlyBudgetReport {
        month,
        total_income: totals.income,
        total_expense: totals.expense,
        balance: totals.balance,
        categories,
        transaction_count: totals.count,
    }
}

/// How much of each of the month's budgets has been spent.
pub fn budget_utilization(
    month: Month,
    transactions: &[Transaction],
    budgets: &[Budget],
) -> Vec<BudgetUtilization> {
    let spent: BTreeMap<String, f64> = expense_by_category(
        transactions.iter().filter(|tx| month.contains(tx.date)),
    )
    .into_named()
    .map(|(key, _, (amount, _))| (key, amount))
    .collect();

    let mut utilization: Vec<BudgetUtilization> = budgets
        .iter()
        .filter(|b| b.month == month)
        .map(|budget| {
            let spent = spent
                .get(&normalize_category(&budget.category))
                .copied()
                .unwrap_or(0.0);
            BudgetUtilization {
                category: budget.category.clone(),
                budget: budget.amount,
                spent,
                remaining: budget.amount - spent,
                percentage: percentage(spent, budget.amount),
            }
        })
        .collect();
    utilization.sort_by(|a, b| a.category.cmp(&b.category));
    utilization
}

/// Short plain-language remarks on a month.
pub fn insights(analytics: &MonthlyAnalytics) -> Vec<String> {
    let mut insights = Vec::new();
    if analytics.balance > 0.0 {
        insights.push(format!(
            "Great! You saved ${:.2} this month",
            analytics.balance
        ));
    } else if analytics.balance < 0.0 {
        insights.push(format!(
            "You spent ${:.2} more than you earned this month",
            -analytics.balance
        ));
    } else {
        insights.push("You broke even this month".to_string());
    }

    // Largest net outflow; ties go to the alphabetically first category.
    let top = analytics
        .category_totals
        .iter()
        .filter(|(_, amount)| **amount < 0.0)
        .fold(None::<(&String, f64)>, |top, (category, amount)| match top {
            Some((_, best)) if -amount <= best => top,
            _ => Some((category, -amount)),
        });
    if let Some((category, amount)) = top {
        insights.push(format!(
            "Your highest spending category was {category} with ${amount:.2}"
        ));
    }
    insights
}

/// Distinct categories in use, ordered by name.
pub fn unique_categories(transactions: &[Transaction]) -> Vec<String> {
    let mut grouped: Grouped<()> = Grouped::default();
    for tx in transactions {
        grouped.entry(&tx.category);
    }
    let mut names: Vec<String> = grouped.into_named().map(|(_, name, _)| name).collect();
    names.sort();
    names
}

pub fn category_options(transactions: &[Transaction]) -> Vec<CategoryOption> {
    unique_categories(transactions)
        .into_iter()
        .map(|value| {
            let mut chars = value.chars();
            let label = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            CategoryOption { label, value }
        })
        .collect()
}

/// Months with at least one transaction, most recent first.
pub fn months_with_transactions(transactions: &[Transaction]) -> Vec<Month> {
    let months: BTreeSet<Month> = transactions.iter().map(Transaction::month).collect();
    months.into_iter().rev().collect()
}
