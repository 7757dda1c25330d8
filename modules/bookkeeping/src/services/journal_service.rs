//! Journal entry business logic service
//!
//! Drives the lifecycle of a journal entry: draft → posted → voided.
//! Validation is delegated to [`crate::validation`], the fiscal-year
//! boundary to [`fiscal_year_service::ensure_postable`]; this module does the
//! store lookups and the state changes.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::contracts::journal_entry_draft_v1::JournalEntryDraftV1;
use crate::models::{EntryStatus, JournalEntry, JournalLine, OrgContext, VatDetail};
use crate::money::MoneyError;
use crate::repos::{BookkeepingStore, StoreError};
use crate::services::fiscal_year_service::{self, FiscalYearError};
use crate::validation::{validate_for_post_with_tolerance, ValidationError};

/// Errors that can occur during journal entry processing
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JournalError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fiscal year check failed: {0}")]
    FiscalYear(#[from] FiscalYearError),

    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyError),

    #[error("Journal entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Line {line}: account {account_id} not found in chart of accounts")]
    AccountNotFound { line: usize, account_id: Uuid },

    #[error("Cannot {action} entry {entry_id} with status {status}")]
    InvalidStatusTransition {
        entry_id: Uuid,
        status: EntryStatus,
        action: &'static str,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for journal operations
pub type JournalResult<T> = Result<T, JournalError>;

impl JournalError {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::FiscalYear(e) => e.code(),
            Self::Amount(_) => "INVALID_AMOUNT",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::Store(StoreError::DuplicateVerificationNumber { .. }) => {
                "DUPLICATE_VERIFICATION_NUMBER"
            }
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

async fn load_entry(
    store: &dyn BookkeepingStore,
    organization_id: Uuid,
    entry_id: Uuid,
) -> JournalResult<JournalEntry> {
    store
        .find_entry(organization_id, entry_id)
        .await?
        .ok_or(JournalError::EntryNotFound(entry_id))
}

/// Store a new draft for the context's organization.
///
/// A draft may be unbalanced; its fiscal year must exist.
pub async fn create_draft(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    mut draft: JournalEntry,
) -> JournalResult<JournalEntry> {
    fiscal_year_service::get_fiscal_year(store, ctx.organization_id, draft.fiscal_year_id).await?;

    draft.organization_id = ctx.organization_id;
    draft.status = EntryStatus::Draft;
    draft.verification_number = None;
    draft.posted_at = None;

    store.insert_entry(&draft).await?;

    tracing::debug!(
        organization_id = %ctx.organization_id,
        entry_id = %draft.id,
        "Draft journal entry created"
    );

    Ok(draft)
}

/// Convert a contract payload and store it as a draft
pub async fn create_draft_from_contract(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    config: &Config,
    payload: JournalEntryDraftV1,
) -> JournalResult<JournalEntry> {
    let draft = payload.into_draft(ctx.organization_id, config.minor_unit_decimals)?;
    create_draft(store, ctx, draft).await
}

/// Replace date, description and lines of a stored draft
pub async fn update_draft(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    entry_id: Uuid,
    entry_date: Option<NaiveDate>,
    description: &str,
    lines: Vec<JournalLine>,
) -> JournalResult<JournalEntry> {
    let mut entry = load_entry(store, ctx.organization_id, entry_id).await?;
    if entry.status != EntryStatus::Draft {
        return Err(JournalError::InvalidStatusTransition {
            entry_id,
            status: entry.status,
            action: "edit",
        });
    }

    entry.entry_date = entry_date;
    entry.description = description.to_string();
    entry.lines = lines
        .into_iter()
        .enumerate()
        .map(|(idx, mut line)| {
            line.line_order = (idx + 1) as i32;
            line
        })
        .collect();

    store.update_entry(&entry).await?;
    Ok(entry)
}

/// Post a draft entry.
///
/// This function:
/// 1. Loads the draft and checks it is still a draft
/// 2. Validates the draft (date, lines, balance)
/// 3. Enforces the fiscal-year boundary (date inside, year open)
/// 4. Resolves every account against the chart of accounts
/// 5. Assigns the next verification number and records the posting
///
/// A verification-number conflict from the store is returned unchanged;
/// posting is not idempotent and is never retried here.
pub async fn post_entry(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    config: &Config,
    entry_id: Uuid,
) -> JournalResult<JournalEntry> {
    let mut entry = load_entry(store, ctx.organization_id, entry_id).await?;
    if entry.status != EntryStatus::Draft {
        return Err(JournalError::InvalidStatusTransition {
            entry_id,
            status: entry.status,
            action: "post",
        });
    }

    let totals = validate_for_post_with_tolerance(&entry, config.balance_tolerance_minor)
        .inspect_err(|e| {
            tracing::warn!(
                organization_id = %ctx.organization_id,
                entry_id = %entry_id,
                reason = e.code(),
                "Journal entry rejected"
            );
        })?;

    let fiscal_year =
        fiscal_year_service::get_fiscal_year(store, ctx.organization_id, entry.fiscal_year_id)
            .await?;
    let entry_date = entry.entry_date.ok_or(ValidationError::MissingEntryDate)?;
    fiscal_year_service::ensure_postable(&fiscal_year, entry_date).inspect_err(|e| {
        tracing::warn!(
            organization_id = %ctx.organization_id,
            entry_id = %entry_id,
            reason = e.code(),
            "Journal entry rejected by fiscal year boundary"
        );
    })?;

    for (idx, line) in entry.lines.iter().enumerate() {
        let Some(account_id) = line.account_id else {
            continue;
        };
        if store.find_account(ctx.organization_id, account_id).await?.is_none() {
            return Err(JournalError::AccountNotFound {
                line: idx,
                account_id,
            });
        }
    }

    // Blank rows carry nothing into the journal
    entry
        .lines
        .retain(|l| l.account_id.is_some() && (l.debit_minor > 0 || l.credit_minor > 0));

    let verification_number = store.next_verification_number(ctx.organization_id).await?;
    entry.verification_number = Some(verification_number);
    entry.status = EntryStatus::Posted;
    entry.posted_at = Some(Utc::now());

    if let Err(e) = store.update_entry(&entry).await {
        tracing::warn!(
            organization_id = %ctx.organization_id,
            entry_id = %entry_id,
            verification_number,
            error = %e,
            "Posting rejected by store"
        );
        return Err(e.into());
    }

    tracing::info!(
        organization_id = %ctx.organization_id,
        entry_id = %entry_id,
        verification_number,
        total_minor = totals.total_debit_minor,
        "Journal entry posted"
    );

    Ok(entry)
}

/// Void a posted entry. Terminal; the entry stays in the journal.
pub async fn void_entry(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    entry_id: Uuid,
    reason: &str,
) -> JournalResult<JournalEntry> {
    let mut entry = load_entry(store, ctx.organization_id, entry_id).await?;
    if entry.status != EntryStatus::Posted {
        return Err(JournalError::InvalidStatusTransition {
            entry_id,
            status: entry.status,
            action: "void",
        });
    }

    let fiscal_year =
        fiscal_year_service::get_fiscal_year(store, ctx.organization_id, entry.fiscal_year_id)
            .await?;
    if fiscal_year.is_closed {
        return Err(FiscalYearError::Closed(fiscal_year.id).into());
    }

    entry.status = EntryStatus::Voided;
    entry.voided_at = Some(Utc::now());
    entry.void_reason = Some(reason.to_string());
    store.update_entry(&entry).await?;

    tracing::info!(
        organization_id = %ctx.organization_id,
        entry_id = %entry_id,
        verification_number = ?entry.verification_number,
        reason = %reason,
        "Journal entry voided"
    );

    Ok(entry)
}

/// Build a draft that reverses a posted entry: every line has its debit and
/// credit swapped.
pub fn build_reversal_draft(
    original: &JournalEntry,
    fiscal_year_id: Uuid,
    reversal_date: NaiveDate,
) -> JournalEntry {
    let lines = original
        .lines
        .iter()
        .map(|line| JournalLine {
            account_id: line.account_id,
            debit_minor: line.credit_minor,
            credit_minor: line.debit_minor,
            description: line.description.clone(),
            line_order: line.line_order,
            vat: line.vat.as_ref().map(|v| VatDetail {
                direction: v.direction,
                rate: v.rate,
                tax_base_minor: -v.tax_base_minor,
                vat_amount_minor: -v.vat_amount_minor,
            }),
        })
        .collect();

    let description = match original.verification_number {
        Some(n) => format!("Reversal of verification {}: {}", n, original.description),
        None => format!("Reversal: {}", original.description),
    };

    let mut draft = JournalEntry::new_draft(
        original.organization_id,
        fiscal_year_id,
        Some(reversal_date),
        description,
        lines,
    );
    draft.reverses_entry_id = Some(original.id);
    draft
}

/// Store a reversal draft for a posted entry, in the fiscal year that
/// contains `reversal_date`.
pub async fn create_reversal_draft(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    entry_id: Uuid,
    reversal_date: NaiveDate,
) -> JournalResult<JournalEntry> {
    let original = load_entry(store, ctx.organization_id, entry_id).await?;
    if original.status != EntryStatus::Posted {
        return Err(JournalError::InvalidStatusTransition {
            entry_id,
            status: original.status,
            action: "reverse",
        });
    }

    let years = store.list_fiscal_years(ctx.organization_id).await?;
    let fiscal_year = fiscal_year_service::find_for_date(&years, reversal_date).ok_or(
        FiscalYearError::NoFiscalYearForDate {
            organization_id: ctx.organization_id,
            date: reversal_date,
        },
    )?;

    let draft = build_reversal_draft(&original, fiscal_year.id, reversal_date);
    create_draft(store, ctx, draft).await
}
