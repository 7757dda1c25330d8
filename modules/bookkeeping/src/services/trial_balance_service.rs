//! Trial Balance Service
//!
//! Per-account movement and balances for a range, recomputed from the
//! posted journal. Unlike the general ledger, accounts with only an opening
//! balance and no movement in range are included.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, AccountClass, JournalEntry, OrgContext};
use crate::money::checked_sum;
use crate::repos::{BookkeepingStore, EntryFilter};
use crate::services::ledger_service::{
    self, compute_account_ledger, LedgerError, LedgerQuery, LedgerSort,
};

/// Trial balance with account rows and totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub organization_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub rows: Vec<TrialBalanceRow>,
    pub totals: TrialBalanceTotals,
}

/// Trial balance row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub account_number: String,
    pub account_name: String,
    pub account_class: AccountClass,
    pub opening_balance_minor: i64,
    pub debit_total_minor: i64,
    pub credit_total_minor: i64,
    /// Movement in range (debit positive)
    pub net_change_minor: i64,
    pub closing_balance_minor: i64,
}

/// Trial balance totals for verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceTotals {
    pub total_debits: i64,
    pub total_credits: i64,
    pub is_balanced: bool,
}

/// Compute the trial balance over already-fetched data.
///
/// Rows are the accounts referenced by a posted line dated on or before the
/// end of the range whose opening or closing balance is non-zero or that
/// moved in range, ordered by account number.
pub fn compute_trial_balance(
    organization_id: Uuid,
    accounts: &[Account],
    entries: &[JournalEntry],
    query: &LedgerQuery,
    fiscal_year_start: Option<NaiveDate>,
) -> Result<TrialBalance, LedgerError> {
    let catalog: HashMap<Uuid, &Account> = accounts.iter().map(|a| (a.id, a)).collect();

    let referenced: BTreeSet<Uuid> = entries
        .iter()
        .filter(|e| e.is_posted())
        .filter(|e| match (e.entry_date, query.end_date) {
            (Some(date), Some(end_date)) => date <= end_date,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .flat_map(|e| e.lines.iter().filter_map(|l| l.account_id))
        .collect();

    let mut ledgers = Vec::with_capacity(referenced.len());
    for account_id in referenced {
        let account = catalog
            .get(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let ledger = compute_account_ledger(account, entries, query, fiscal_year_start)?;
        if ledger.entries.is_empty() && ledger.opening_balance_minor == 0 {
            continue;
        }
        ledgers.push(ledger);
    }
    ledger_service::sort_ledgers(&mut ledgers, LedgerSort::AccountNumber);

    let rows = ledgers
        .into_iter()
        .map(|l| -> Result<TrialBalanceRow, LedgerError> {
            Ok(TrialBalanceRow {
                net_change_minor: l
                    .total_debit_minor
                    .checked_sub(l.total_credit_minor)
                    .ok_or(LedgerError::AmountOverflow)?,
                account_id: l.account.id,
                account_number: l.account.account_number,
                account_name: l.account.name,
                account_class: l.account.account_class,
                opening_balance_minor: l.opening_balance_minor,
                debit_total_minor: l.total_debit_minor,
                credit_total_minor: l.total_credit_minor,
                closing_balance_minor: l.closing_balance_minor,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    let totals = calculate_totals(&rows)?;

    Ok(TrialBalance {
        organization_id,
        start_date: query.start_date,
        end_date: query.end_date,
        rows,
        totals,
    })
}

/// Calculate trial balance totals
///
/// Sums all debit and credit totals and checks if they balance.
fn calculate_totals(rows: &[TrialBalanceRow]) -> Result<TrialBalanceTotals, LedgerError> {
    let total_debits = checked_sum(rows.iter().map(|r| r.debit_total_minor))
        .ok_or(LedgerError::AmountOverflow)?;
    let total_credits = checked_sum(rows.iter().map(|r| r.credit_total_minor))
        .ok_or(LedgerError::AmountOverflow)?;
    let is_balanced = total_debits == total_credits;

    Ok(TrialBalanceTotals {
        total_debits,
        total_credits,
        is_balanced,
    })
}

/// Get the trial balance for an organization
pub async fn get_trial_balance(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    query: &LedgerQuery,
) -> Result<TrialBalance, LedgerError> {
    let (query, fiscal_year_start) = ledger_service::prepare_query(store, ctx, query).await?;
    let accounts = store.list_accounts(ctx.organization_id).await?;
    let entries = store
        .list_entries(&EntryFilter::posted(ctx.organization_id))
        .await?;

    let trial_balance =
        compute_trial_balance(ctx.organization_id, &accounts, &entries, &query, fiscal_year_start)?;

    tracing::debug!(
        organization_id = %ctx.organization_id,
        rows = trial_balance.rows.len(),
        is_balanced = trial_balance.totals.is_balanced,
        "Trial balance computed"
    );

    Ok(trial_balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryStatus, JournalLine};

    fn row(number: &str, debit: i64, credit: i64) -> TrialBalanceRow {
        TrialBalanceRow {
            account_id: Uuid::new_v4(),
            account_number: number.to_string(),
            account_name: number.to_string(),
            account_class: AccountClass::from_account_number(number).unwrap(),
            opening_balance_minor: 0,
            debit_total_minor: debit,
            credit_total_minor: credit,
            net_change_minor: debit - credit,
            closing_balance_minor: debit - credit,
        }
    }

    fn account(number: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            account_number: number.to_string(),
            name: number.to_string(),
            name_english: None,
            account_class: AccountClass::from_account_number(number).unwrap(),
        }
    }

    #[test]
    fn test_calculate_totals_balanced() {
        let rows = vec![row("1930", 100000, 0), row("3011", 0, 100000)];
        let totals = calculate_totals(&rows).unwrap();
        assert_eq!(totals.total_debits, 100000);
        assert_eq!(totals.total_credits, 100000);
        assert!(totals.is_balanced);
    }

    #[test]
    fn test_calculate_totals_unbalanced() {
        let rows = vec![row("1930", 150000, 0), row("3011", 0, 100000)];
        let totals = calculate_totals(&rows).unwrap();
        assert_eq!(totals.total_debits, 150000);
        assert_eq!(totals.total_credits, 100000);
        assert!(!totals.is_balanced);
    }

    #[test]
    fn test_calculate_totals_overflow() {
        let rows = vec![row("1930", i64::MAX, 0), row("1510", 1, 0), row("3011", 0, 1)];
        assert_eq!(calculate_totals(&rows), Err(LedgerError::AmountOverflow));
    }

    #[test]
    fn test_opening_only_accounts_are_included() {
        let bank = account("1930");
        let equity = account("2081");
        let sales = account("3011");

        let mut capital = JournalEntry::new_draft(
            Uuid::nil(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 1, 2),
            "Aktiekapital",
            vec![
                JournalLine::debit(bank.id, 2500000),
                JournalLine::credit(equity.id, 2500000),
            ],
        );
        capital.status = EntryStatus::Posted;
        capital.verification_number = Some(1);

        let mut sale = JournalEntry::new_draft(
            Uuid::nil(),
            capital.fiscal_year_id,
            NaiveDate::from_ymd_opt(2024, 2, 10),
            "Försäljning",
            vec![
                JournalLine::debit(bank.id, 10000),
                JournalLine::credit(sales.id, 10000),
            ],
        );
        sale.status = EntryStatus::Posted;
        sale.verification_number = Some(2);

        let query = LedgerQuery::range(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        );
        let tb = compute_trial_balance(
            Uuid::nil(),
            &[bank, equity, sales],
            &[sale, capital],
            &query,
            None,
        )
        .unwrap();

        let numbers: Vec<&str> = tb.rows.iter().map(|r| r.account_number.as_str()).collect();
        assert_eq!(numbers, vec!["1930", "2081", "3011"]);
        assert_eq!(tb.rows[0].opening_balance_minor, 2500000);
        assert_eq!(tb.rows[0].closing_balance_minor, 2510000);
        assert_eq!(tb.rows[1].debit_total_minor, 0);
        assert!(tb.totals.is_balanced);
        assert_eq!(tb.totals.total_debits, 10000);
    }
}
