//! General Ledger Service
//!
//! Read projection over the posted journal: opening balance, chronological
//! running balance and closing balance per account. Nothing here is stored;
//! every query recomputes from the entries the store hands back.
//!
//! Ordering contract: lines are walked by `(entry_date, verification_number,
//! line_order)` ascending, so two entries on the same date follow posting
//! sequence regardless of the order the store returned them in.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, JournalEntry, JournalLine, OrgContext};
use crate::money::checked_sum;
use crate::repos::{BookkeepingStore, EntryFilter, StoreError};
use crate::services::fiscal_year_service::{self, FiscalYearError};

/// Errors that can occur during ledger queries
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Invalid date range: start {start_date} is after end {end_date}")]
    InvalidRange {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("Ledger amounts exceed the representable range")]
    AmountOverflow,

    #[error("Fiscal year error: {0}")]
    FiscalYear(#[from] FiscalYearError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Which prior postings make up the opening balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningBalanceScope {
    /// Every posted line of the organization dated before the range
    #[default]
    Organization,

    /// Only prior lines of the query's fiscal year
    FiscalYear,

    /// Balance-sheet accounts carry their whole history; income-statement
    /// accounts start from zero at the start of the fiscal year
    CarryForward,
}

/// Ledger query parameters. Both bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Restricts the in-range lines (and, with `OpeningBalanceScope::FiscalYear`,
    /// the opening balance) to one fiscal year
    pub fiscal_year_id: Option<Uuid>,
    #[serde(default)]
    pub opening_scope: OpeningBalanceScope,
}

impl LedgerQuery {
    pub fn range(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        }
    }

    pub fn in_fiscal_year(mut self, fiscal_year_id: Uuid) -> Self {
        self.fiscal_year_id = Some(fiscal_year_id);
        self
    }

    pub fn with_opening_scope(mut self, opening_scope: OpeningBalanceScope) -> Self {
        self.opening_scope = opening_scope;
        self
    }

    fn check_range(&self) -> Result<(), LedgerError> {
        match (self.start_date, self.end_date) {
            (Some(start_date), Some(end_date)) if start_date > end_date => {
                Err(LedgerError::InvalidRange {
                    start_date,
                    end_date,
                })
            }
            _ => Ok(()),
        }
    }

    fn contains(&self, entry: &JournalEntry, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |s| date >= s)
            && self.end_date.map_or(true, |e| date <= e)
            && self.fiscal_year_id.map_or(true, |fy| entry.fiscal_year_id == fy)
    }
}

/// One ledger row: a journal line touching the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub entry_date: NaiveDate,
    pub verification_number: Option<i64>,
    pub line_order: i32,
    pub description: String,
    pub debit_minor: i64,
    pub credit_minor: i64,
    /// Balance up to and including this row (debit positive)
    pub running_balance_minor: i64,
}

/// Ledger of a single account over the queried range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account: Account,
    pub opening_balance_minor: i64,
    pub entries: Vec<LedgerEntry>,
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
    pub closing_balance_minor: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSort {
    #[default]
    AccountNumber,
    AccountName,
}

/// Ledger of every account with at least one line in range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralLedger {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub accounts: Vec<AccountLedger>,
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
}

/// Posted lines with their entry and date, skipping anything not posted
fn posted_lines(
    entries: &[JournalEntry],
) -> impl Iterator<Item = (&JournalEntry, NaiveDate, &JournalLine)> {
    entries
        .iter()
        .filter(|e| e.is_posted())
        .filter_map(|e| e.entry_date.map(|d| (e, d)))
        .flat_map(|(e, d)| e.lines.iter().map(move |l| (e, d, l)))
}

fn counts_toward_opening(
    account: &Account,
    query: &LedgerQuery,
    start_date: NaiveDate,
    fiscal_year_start: Option<NaiveDate>,
    entry: &JournalEntry,
    date: NaiveDate,
) -> bool {
    if date >= start_date {
        return false;
    }
    match query.opening_scope {
        OpeningBalanceScope::Organization => true,
        OpeningBalanceScope::FiscalYear => {
            query.fiscal_year_id.map_or(true, |fy| entry.fiscal_year_id == fy)
        }
        OpeningBalanceScope::CarryForward => {
            account.account_class.is_balance_sheet()
                || fiscal_year_start.map_or(true, |fy_start| date >= fy_start)
        }
    }
}

/// Compute the ledger of one account.
///
/// `entries` may contain anything the store returned for the organization;
/// only posted entries are considered and input order does not matter.
/// `fiscal_year_start` is the start of the fiscal year containing the
/// query's start date, used by `OpeningBalanceScope::CarryForward`.
///
/// Fails with `AmountOverflow` if a balance or total leaves the `i64` range.
pub fn compute_account_ledger(
    account: &Account,
    entries: &[JournalEntry],
    query: &LedgerQuery,
    fiscal_year_start: Option<NaiveDate>,
) -> Result<AccountLedger, LedgerError> {
    let mut opening_balance_minor = 0i64;
    let mut rows: Vec<(&JournalEntry, NaiveDate, &JournalLine)> = Vec::new();

    for (entry, date, line) in posted_lines(entries) {
        if line.account_id != Some(account.id) {
            continue;
        }
        if query.contains(entry, date) {
            rows.push((entry, date, line));
        } else if let Some(start_date) = query.start_date {
            if counts_toward_opening(account, query, start_date, fiscal_year_start, entry, date) {
                opening_balance_minor = add(opening_balance_minor, net(line)?)?;
            }
        }
    }

    rows.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.verification_number.cmp(&b.0.verification_number))
            .then_with(|| a.2.line_order.cmp(&b.2.line_order))
    });

    let mut running_balance_minor = opening_balance_minor;
    let mut total_debit_minor = 0i64;
    let mut total_credit_minor = 0i64;

    let ledger_entries = rows
        .into_iter()
        .map(|(entry, date, line)| -> Result<LedgerEntry, LedgerError> {
            running_balance_minor = add(running_balance_minor, net(line)?)?;
            total_debit_minor = add(total_debit_minor, line.debit_minor)?;
            total_credit_minor = add(total_credit_minor, line.credit_minor)?;

            Ok(LedgerEntry {
                entry_id: entry.id,
                entry_date: date,
                verification_number: entry.verification_number,
                line_order: line.line_order,
                description: line
                    .description
                    .clone()
                    .unwrap_or_else(|| entry.description.clone()),
                debit_minor: line.debit_minor,
                credit_minor: line.credit_minor,
                running_balance_minor,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    Ok(AccountLedger {
        account: account.clone(),
        opening_balance_minor,
        entries: ledger_entries,
        total_debit_minor,
        total_credit_minor,
        closing_balance_minor: running_balance_minor,
    })
}

fn add(a: i64, b: i64) -> Result<i64, LedgerError> {
    a.checked_add(b).ok_or(LedgerError::AmountOverflow)
}

fn net(line: &JournalLine) -> Result<i64, LedgerError> {
    line.net_minor().ok_or(LedgerError::AmountOverflow)
}

/// Sort account ledgers; ties fall back to account number, then id.
pub fn sort_ledgers(ledgers: &mut [AccountLedger], sort: LedgerSort) {
    ledgers.sort_by(|a, b| {
        let primary = match sort {
            LedgerSort::AccountNumber => a.account.account_number.cmp(&b.account.account_number),
            LedgerSort::AccountName => a.account.name.cmp(&b.account.name),
        };
        primary
            .then_with(|| a.account.account_number.cmp(&b.account.account_number))
            .then_with(|| a.account.id.cmp(&b.account.id))
    });
}

/// Compute the ledger of every account with at least one posted line in
/// range.
///
/// A line referencing an account missing from `accounts` fails the whole
/// query with `AccountNotFound`.
pub fn compute_general_ledger(
    accounts: &[Account],
    entries: &[JournalEntry],
    query: &LedgerQuery,
    fiscal_year_start: Option<NaiveDate>,
    sort: LedgerSort,
) -> Result<GeneralLedger, LedgerError> {
    query.check_range()?;

    let catalog: HashMap<Uuid, &Account> = accounts.iter().map(|a| (a.id, a)).collect();

    let active: BTreeSet<Uuid> = posted_lines(entries)
        .filter(|(entry, date, _)| query.contains(entry, *date))
        .filter_map(|(_, _, line)| line.account_id)
        .collect();

    let mut ledgers = active
        .into_iter()
        .map(|account_id| -> Result<AccountLedger, LedgerError> {
            let account = catalog
                .get(&account_id)
                .ok_or(LedgerError::AccountNotFound(account_id))?;
            compute_account_ledger(account, entries, query, fiscal_year_start)
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    sort_ledgers(&mut ledgers, sort);

    let total_debit_minor = checked_sum(ledgers.iter().map(|l| l.total_debit_minor))
        .ok_or(LedgerError::AmountOverflow)?;
    let total_credit_minor = checked_sum(ledgers.iter().map(|l| l.total_credit_minor))
        .ok_or(LedgerError::AmountOverflow)?;

    Ok(GeneralLedger {
        start_date: query.start_date,
        end_date: query.end_date,
        accounts: ledgers,
        total_debit_minor,
        total_credit_minor,
    })
}

/// Fill the fiscal year from the context and resolve the start of the
/// fiscal year used for carry-forward.
pub(crate) async fn prepare_query(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    query: &LedgerQuery,
) -> Result<(LedgerQuery, Option<NaiveDate>), LedgerError> {
    query.check_range()?;

    let mut query = query.clone();
    if query.fiscal_year_id.is_none() {
        query.fiscal_year_id = ctx.fiscal_year_id;
    }

    let fiscal_year_start = match (query.opening_scope, query.start_date) {
        (OpeningBalanceScope::CarryForward, Some(start_date)) => {
            let years = store.list_fiscal_years(ctx.organization_id).await?;
            match query.fiscal_year_id {
                Some(fiscal_year_id) => Some(
                    years
                        .iter()
                        .find(|fy| fy.id == fiscal_year_id)
                        .ok_or(FiscalYearError::NotFound {
                            organization_id: ctx.organization_id,
                            fiscal_year_id,
                        })?
                        .start_date,
                ),
                None => {
                    fiscal_year_service::find_for_date(&years, start_date).map(|fy| fy.start_date)
                }
            }
        }
        _ => None,
    };

    Ok((query, fiscal_year_start))
}

/// Ledger of a single account
pub async fn get_account_ledger(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    account_id: Uuid,
    query: &LedgerQuery,
) -> Result<AccountLedger, LedgerError> {
    let account = store
        .find_account(ctx.organization_id, account_id)
        .await?
        .ok_or(LedgerError::AccountNotFound(account_id))?;

    let (query, fiscal_year_start) = prepare_query(store, ctx, query).await?;
    let entries = store
        .list_entries(&EntryFilter::posted(ctx.organization_id))
        .await?;

    let ledger = compute_account_ledger(&account, &entries, &query, fiscal_year_start)?;

    tracing::debug!(
        organization_id = %ctx.organization_id,
        account_number = %account.account_number,
        rows = ledger.entries.len(),
        closing_balance_minor = ledger.closing_balance_minor,
        "Account ledger computed"
    );

    Ok(ledger)
}

/// Ledger of every account with activity in range
pub async fn get_general_ledger(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    query: &LedgerQuery,
    sort: LedgerSort,
) -> Result<GeneralLedger, LedgerError> {
    let (query, fiscal_year_start) = prepare_query(store, ctx, query).await?;
    let accounts = store.list_accounts(ctx.organization_id).await?;
    let entries = store
        .list_entries(&EntryFilter::posted(ctx.organization_id))
        .await?;

    let ledger = compute_general_ledger(&accounts, &entries, &query, fiscal_year_start, sort)?;

    tracing::debug!(
        organization_id = %ctx.organization_id,
        accounts = ledger.accounts.len(),
        total_debit_minor = ledger.total_debit_minor,
        "General ledger computed"
    );

    Ok(ledger)
}
