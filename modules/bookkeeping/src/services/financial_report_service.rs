//! Financial Report Service
//!
//! Income statement (resultaträkning) and balance sheet (balansräkning)
//! derived from the trial balance. Amounts are presented with natural signs:
//! revenue, liabilities and equity are shown positive when they carry their
//! normal credit balance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountClass, OrgContext};
use crate::money::checked_sum;
use crate::repos::BookkeepingStore;
use crate::services::ledger_service::{LedgerError, LedgerQuery};
use crate::services::trial_balance_service::{self, TrialBalance, TrialBalanceRow};

/// One account line of a report section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub account_number: String,
    pub account_name: String,
    pub amount_minor: i64,
}

/// All accounts of one class with their total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub account_class: AccountClass,
    pub lines: Vec<ReportLine>,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub organization_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: ReportSection,
    pub expenses: ReportSection,
    /// Revenue minus expenses; negative is a loss
    pub result_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub organization_id: Uuid,
    pub as_of: NaiveDate,
    pub assets: ReportSection,
    pub liabilities: ReportSection,
    pub equity: ReportSection,
    /// Accumulated result of the income-statement accounts not yet
    /// transferred to equity
    pub result_minor: i64,
    /// assets == liabilities + equity + result
    pub is_balanced: bool,
}

/// Debit-positive amounts for assets and expenses, credit-positive otherwise
fn presentation_sign(class: AccountClass) -> i64 {
    match class {
        AccountClass::Asset | AccountClass::Expense => 1,
        AccountClass::Liability | AccountClass::Equity | AccountClass::Revenue => -1,
    }
}

fn build_section(
    rows: &[TrialBalanceRow],
    class: AccountClass,
    amount: impl Fn(&TrialBalanceRow) -> i64,
) -> Result<ReportSection, LedgerError> {
    let sign = presentation_sign(class);
    let lines = rows
        .iter()
        .filter(|r| r.account_class == class && amount(r) != 0)
        .map(|r| -> Result<ReportLine, LedgerError> {
            Ok(ReportLine {
                account_number: r.account_number.clone(),
                account_name: r.account_name.clone(),
                amount_minor: sign
                    .checked_mul(amount(r))
                    .ok_or(LedgerError::AmountOverflow)?,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;
    let total_minor =
        checked_sum(lines.iter().map(|l| l.amount_minor)).ok_or(LedgerError::AmountOverflow)?;

    Ok(ReportSection {
        account_class: class,
        lines,
        total_minor,
    })
}

/// Build the income statement from the movement of a trial balance
pub fn build_income_statement(
    trial_balance: &TrialBalance,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<IncomeStatement, LedgerError> {
    let rows = &trial_balance.rows;
    let revenue = build_section(rows, AccountClass::Revenue, |r| r.net_change_minor)?;
    let expenses = build_section(rows, AccountClass::Expense, |r| r.net_change_minor)?;
    let result_minor = revenue
        .total_minor
        .checked_sub(expenses.total_minor)
        .ok_or(LedgerError::AmountOverflow)?;

    Ok(IncomeStatement {
        organization_id: trial_balance.organization_id,
        start_date,
        end_date,
        revenue,
        expenses,
        result_minor,
    })
}

/// Build the balance sheet from the closing balances of a trial balance
/// computed over the full history up to `as_of`
pub fn build_balance_sheet(
    trial_balance: &TrialBalance,
    as_of: NaiveDate,
) -> Result<BalanceSheet, LedgerError> {
    let rows = &trial_balance.rows;
    let assets = build_section(rows, AccountClass::Asset, |r| r.closing_balance_minor)?;
    let liabilities = build_section(rows, AccountClass::Liability, |r| r.closing_balance_minor)?;
    let equity = build_section(rows, AccountClass::Equity, |r| r.closing_balance_minor)?;

    let result_minor = rows
        .iter()
        .filter(|r| !r.account_class.is_balance_sheet())
        .try_fold(0i64, |acc, r| acc.checked_sub(r.closing_balance_minor))
        .ok_or(LedgerError::AmountOverflow)?;

    // Compared in i128 so the equation itself cannot overflow
    let is_balanced = i128::from(assets.total_minor)
        == i128::from(liabilities.total_minor)
            + i128::from(equity.total_minor)
            + i128::from(result_minor);

    Ok(BalanceSheet {
        organization_id: trial_balance.organization_id,
        as_of,
        assets,
        liabilities,
        equity,
        result_minor,
        is_balanced,
    })
}

/// Income statement for `[start_date, end_date]`
pub async fn get_income_statement(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<IncomeStatement, LedgerError> {
    // Date range only; the statement is not limited to the context's fiscal year
    let ctx = OrgContext::new(ctx.organization_id);
    let query = LedgerQuery::range(start_date, end_date);
    let trial_balance = trial_balance_service::get_trial_balance(store, &ctx, &query).await?;
    build_income_statement(&trial_balance, start_date, end_date)
}

/// Balance sheet as of `as_of` (inclusive)
pub async fn get_balance_sheet(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    as_of: NaiveDate,
) -> Result<BalanceSheet, LedgerError> {
    let ctx = OrgContext::new(ctx.organization_id);
    let query = LedgerQuery {
        end_date: Some(as_of),
        ..Default::default()
    };
    let trial_balance = trial_balance_service::get_trial_balance(store, &ctx, &query).await?;
    let balance_sheet = build_balance_sheet(&trial_balance, as_of)?;

    if !balance_sheet.is_balanced {
        tracing::warn!(
            organization_id = %ctx.organization_id,
            as_of = %as_of,
            assets_minor = balance_sheet.assets.total_minor,
            "Balance sheet does not balance"
        );
    }

    Ok(balance_sheet)
}
