//! Fiscal Year Service
//!
//! Owns the set of accounting periods of an organization: creation,
//! default selection, the posting-date boundary check, and the explicit
//! close / reopen transitions with their audit record.

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::contracts::fiscal_year_close_v1::{
    CloseValidationReport, FiscalYearState, FiscalYearTransition, ValidationIssue,
    ValidationSeverity,
};
use crate::config::Config;
use crate::models::{EntryStatus, FiscalYear, JournalEntry, OrgContext};
use crate::money::checked_sum;
use crate::repos::{BookkeepingStore, EntryFilter, StoreError};
use crate::validation::compute_totals_with_tolerance;

/// Errors that can occur during fiscal year operations
#[derive(Debug, Error, PartialEq)]
pub enum FiscalYearError {
    #[error(
        "Fiscal year not found: organization_id={organization_id}, fiscal_year_id={fiscal_year_id}"
    )]
    NotFound {
        organization_id: Uuid,
        fiscal_year_id: Uuid,
    },

    #[error("No fiscal year exists for organization {0}")]
    NoFiscalYears(Uuid),

    #[error("No fiscal year of organization {organization_id} contains {date}")]
    NoFiscalYearForDate {
        organization_id: Uuid,
        date: NaiveDate,
    },

    #[error("Fiscal year start {start_date} is after end {end_date}")]
    InvalidRange {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("Fiscal year overlaps existing fiscal year {0}")]
    Overlap(Uuid),

    #[error("Date {date} is outside fiscal year {fiscal_year_id} ({start_date} - {end_date})")]
    DateOutsideFiscalYear {
        fiscal_year_id: Uuid,
        date: NaiveDate,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("Fiscal year is closed: {0}")]
    Closed(Uuid),

    #[error("Fiscal year is already open: {0}")]
    AlreadyOpen(Uuid),

    #[error("Fiscal year cannot be closed: {}", codes(.0))]
    CloseBlocked(CloseValidationReport),

    #[error("Journal totals of fiscal year {0} exceed the representable amount range")]
    AmountOverflow(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

fn codes(report: &CloseValidationReport) -> String {
    report
        .issues
        .iter()
        .filter(|i| i.severity == ValidationSeverity::Error)
        .map(|i| i.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FiscalYearError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "FISCAL_YEAR_NOT_FOUND",
            Self::NoFiscalYears(_) => "NO_FISCAL_YEARS",
            Self::NoFiscalYearForDate { .. } => "NO_FISCAL_YEAR_FOR_DATE",
            Self::InvalidRange { .. } => "INVALID_FISCAL_YEAR_RANGE",
            Self::Overlap(_) => "FISCAL_YEAR_OVERLAP",
            Self::DateOutsideFiscalYear { .. } => "DATE_OUTSIDE_FISCAL_YEAR",
            Self::Closed(_) => "FISCAL_YEAR_CLOSED",
            Self::AlreadyOpen(_) => "FISCAL_YEAR_ALREADY_OPEN",
            Self::CloseBlocked(_) => "FISCAL_YEAR_CLOSE_BLOCKED",
            Self::AmountOverflow(_) => "AMOUNT_OVERFLOW",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

// ============================================================
// Pure operations
// ============================================================

/// Pick the fiscal year to use when none is explicitly selected.
///
/// Prefers the first open year in the given order; if every year is
/// closed, falls back to the most recently created one (ties broken by the
/// later start date).
pub fn select_default(fiscal_years: &[FiscalYear]) -> Option<Uuid> {
    if let Some(open) = fiscal_years.iter().find(|fy| !fy.is_closed) {
        return Some(open.id);
    }

    fiscal_years
        .iter()
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.start_date.cmp(&b.start_date))
        })
        .map(|fy| fy.id)
}

/// Find the fiscal year whose range contains `date`.
pub fn find_for_date(fiscal_years: &[FiscalYear], date: NaiveDate) -> Option<&FiscalYear> {
    fiscal_years.iter().find(|fy| fy.contains_date(date))
}

/// Boundary check shared with posting: the date must lie inside the year
/// and the year must be open.
pub fn ensure_postable(fiscal_year: &FiscalYear, date: NaiveDate) -> Result<(), FiscalYearError> {
    if !fiscal_year.contains_date(date) {
        return Err(FiscalYearError::DateOutsideFiscalYear {
            fiscal_year_id: fiscal_year.id,
            date,
            start_date: fiscal_year.start_date,
            end_date: fiscal_year.end_date,
        });
    }
    if fiscal_year.is_closed {
        return Err(FiscalYearError::Closed(fiscal_year.id));
    }
    Ok(())
}

/// Compute deterministic close hash over the posted journal of a year
///
/// Format: SHA-256(organization_id|fiscal_year_id|entry_count|debits|credits)
pub fn compute_close_hash(
    organization_id: Uuid,
    fiscal_year_id: Uuid,
    posted_entry_count: i64,
    total_debits_minor: i64,
    total_credits_minor: i64,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(organization_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(fiscal_year_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(posted_entry_count.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(total_debits_minor.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(total_credits_minor.to_string().as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Pre-flight check before closing a fiscal year.
///
/// `entries` are all entries (any status) referencing the year. Posted
/// entries are re-checked against the same balance tolerance posting used.
pub fn validate_close(
    fiscal_year: &FiscalYear,
    entries: &[JournalEntry],
    tolerance_minor: i64,
) -> CloseValidationReport {
    let mut issues = Vec::new();

    if fiscal_year.is_closed {
        issues.push(ValidationIssue {
            severity: ValidationSeverity::Error,
            code: "FISCAL_YEAR_ALREADY_CLOSED".to_string(),
            message: format!("Fiscal year {} is already closed", fiscal_year.name),
            metadata: None,
        });
    }

    let unbalanced: Vec<String> = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Posted)
        .filter(|e| !compute_totals_with_tolerance(&e.lines, tolerance_minor).is_balanced)
        .map(|e| e.id.to_string())
        .collect();
    if !unbalanced.is_empty() {
        issues.push(ValidationIssue {
            severity: ValidationSeverity::Error,
            code: "UNBALANCED_POSTED_ENTRY".to_string(),
            message: format!("{} posted entries are unbalanced", unbalanced.len()),
            metadata: Some(serde_json::json!({ "entry_ids": unbalanced })),
        });
    }

    let drafts = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Draft)
        .count();
    if drafts > 0 {
        issues.push(ValidationIssue {
            severity: ValidationSeverity::Warning,
            code: "DRAFT_ENTRIES_REMAIN".to_string(),
            message: format!(
                "{} draft entries in this fiscal year cannot be posted once it is closed",
                drafts
            ),
            metadata: Some(serde_json::json!({ "draft_count": drafts })),
        });
    }

    CloseValidationReport {
        fiscal_year_id: fiscal_year.id,
        organization_id: fiscal_year.organization_id,
        can_close: !has_blocking_errors(&issues),
        issues,
    }
}

/// Check whether any issue blocks the close
pub fn has_blocking_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == ValidationSeverity::Error)
}

fn journal_seal(
    fiscal_year: &FiscalYear,
    entries: &[JournalEntry],
) -> Result<(String, i64, i64, i64), FiscalYearError> {
    let posted: Vec<&JournalEntry> = entries.iter().filter(|e| e.is_posted()).collect();
    let count = posted.len() as i64;
    let debits = checked_sum(posted.iter().flat_map(|e| e.lines.iter()).map(|l| l.debit_minor))
        .ok_or(FiscalYearError::AmountOverflow(fiscal_year.id))?;
    let credits = checked_sum(posted.iter().flat_map(|e| e.lines.iter()).map(|l| l.credit_minor))
        .ok_or(FiscalYearError::AmountOverflow(fiscal_year.id))?;
    let hash = compute_close_hash(
        fiscal_year.organization_id,
        fiscal_year.id,
        count,
        debits,
        credits,
    );
    Ok((hash, count, debits, credits))
}

// ============================================================
// Store-backed operations
// ============================================================

/// Load a fiscal year or fail with `NotFound`
pub async fn get_fiscal_year(
    store: &dyn BookkeepingStore,
    organization_id: Uuid,
    fiscal_year_id: Uuid,
) -> Result<FiscalYear, FiscalYearError> {
    store
        .find_fiscal_year(organization_id, fiscal_year_id)
        .await?
        .ok_or(FiscalYearError::NotFound {
            organization_id,
            fiscal_year_id,
        })
}

/// Create a fiscal year after checking its range and overlap
pub async fn create_fiscal_year(
    store: &dyn BookkeepingStore,
    organization_id: Uuid,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<FiscalYear, FiscalYearError> {
    if start_date > end_date {
        return Err(FiscalYearError::InvalidRange {
            start_date,
            end_date,
        });
    }

    let fiscal_year = FiscalYear {
        id: Uuid::new_v4(),
        organization_id,
        name: name.to_string(),
        start_date,
        end_date,
        is_closed: false,
        created_at: Utc::now(),
    };

    let existing = store.list_fiscal_years(organization_id).await?;
    if let Some(other) = existing.iter().find(|fy| fy.overlaps(&fiscal_year)) {
        return Err(FiscalYearError::Overlap(other.id));
    }

    store.insert_fiscal_year(&fiscal_year).await?;

    tracing::info!(
        organization_id = %organization_id,
        fiscal_year_id = %fiscal_year.id,
        start_date = %start_date,
        end_date = %end_date,
        "Fiscal year created"
    );

    Ok(fiscal_year)
}

/// Resolve the fiscal year for a context: the explicit selection if any,
/// otherwise [`select_default`] over the years ordered newest start first.
pub async fn resolve_fiscal_year(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
) -> Result<FiscalYear, FiscalYearError> {
    if let Some(fiscal_year_id) = ctx.fiscal_year_id {
        return get_fiscal_year(store, ctx.organization_id, fiscal_year_id).await;
    }

    let mut years = store.list_fiscal_years(ctx.organization_id).await?;
    years.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    let selected =
        select_default(&years).ok_or(FiscalYearError::NoFiscalYears(ctx.organization_id))?;
    years
        .into_iter()
        .find(|fy| fy.id == selected)
        .ok_or(FiscalYearError::NoFiscalYears(ctx.organization_id))
}

async fn list_year_entries(
    store: &dyn BookkeepingStore,
    organization_id: Uuid,
    fiscal_year_id: Uuid,
) -> Result<Vec<JournalEntry>, FiscalYearError> {
    let filter = EntryFilter::organization(organization_id).in_fiscal_year(Some(fiscal_year_id));
    Ok(store.list_entries(&filter).await?)
}

/// Run the close pre-flight check against the store
pub async fn validate_close_for(
    store: &dyn BookkeepingStore,
    config: &Config,
    organization_id: Uuid,
    fiscal_year_id: Uuid,
) -> Result<CloseValidationReport, FiscalYearError> {
    let fiscal_year = get_fiscal_year(store, organization_id, fiscal_year_id).await?;
    let entries = list_year_entries(store, organization_id, fiscal_year_id).await?;
    Ok(validate_close(&fiscal_year, &entries, config.balance_tolerance_minor))
}

/// Close a fiscal year.
///
/// Blocks new postings dated inside it. Ledger projections are not touched;
/// they are recomputed on demand.
pub async fn close_fiscal_year(
    store: &dyn BookkeepingStore,
    config: &Config,
    organization_id: Uuid,
    fiscal_year_id: Uuid,
    actor: &str,
    reason: Option<&str>,
) -> Result<FiscalYearTransition, FiscalYearError> {
    let mut fiscal_year = get_fiscal_year(store, organization_id, fiscal_year_id).await?;
    let entries = list_year_entries(store, organization_id, fiscal_year_id).await?;

    if fiscal_year.is_closed {
        return Err(FiscalYearError::Closed(fiscal_year_id));
    }

    let report = validate_close(&fiscal_year, &entries, config.balance_tolerance_minor);
    if !report.can_close {
        tracing::warn!(
            organization_id = %organization_id,
            fiscal_year_id = %fiscal_year_id,
            issues = report.issues.len(),
            "Fiscal year close blocked by validation"
        );
        return Err(FiscalYearError::CloseBlocked(report));
    }

    let (close_hash, count, debits, credits) = journal_seal(&fiscal_year, &entries)?;

    fiscal_year.is_closed = true;
    store.update_fiscal_year(&fiscal_year).await?;

    tracing::info!(
        organization_id = %organization_id,
        fiscal_year_id = %fiscal_year_id,
        actor = %actor,
        close_hash = %close_hash,
        "Fiscal year closed"
    );

    Ok(FiscalYearTransition {
        fiscal_year_id,
        organization_id,
        from: FiscalYearState::Open,
        to: FiscalYearState::Closed,
        actor: actor.to_string(),
        reason: reason.map(str::to_string),
        close_hash,
        posted_entry_count: count,
        total_debits_minor: debits,
        total_credits_minor: credits,
        transitioned_at: Utc::now(),
    })
}

/// Reopen a closed fiscal year
pub async fn reopen_fiscal_year(
    store: &dyn BookkeepingStore,
    organization_id: Uuid,
    fiscal_year_id: Uuid,
    actor: &str,
    reason: Option<&str>,
) -> Result<FiscalYearTransition, FiscalYearError> {
    let mut fiscal_year = get_fiscal_year(store, organization_id, fiscal_year_id).await?;
    if !fiscal_year.is_closed {
        return Err(FiscalYearError::AlreadyOpen(fiscal_year_id));
    }

    let entries = store
        .list_entries(&EntryFilter::posted(organization_id).in_fiscal_year(Some(fiscal_year_id)))
        .await?;
    let (close_hash, count, debits, credits) = journal_seal(&fiscal_year, &entries)?;

    fiscal_year.is_closed = false;
    store.update_fiscal_year(&fiscal_year).await?;

    tracing::info!(
        organization_id = %organization_id,
        fiscal_year_id = %fiscal_year_id,
        actor = %actor,
        close_hash = %close_hash,
        "Fiscal year reopened"
    );

    Ok(FiscalYearTransition {
        fiscal_year_id,
        organization_id,
        from: FiscalYearState::Closed,
        to: FiscalYearState::Open,
        actor: actor.to_string(),
        reason: reason.map(str::to_string),
        close_hash,
        posted_entry_count: count,
        total_debits_minor: debits,
        total_credits_minor: credits,
        transitioned_at: Utc::now(),
    })
}
