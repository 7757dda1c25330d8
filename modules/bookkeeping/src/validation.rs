//! Journal entry validation
//!
//! Decides whether a draft entry may be posted and computes the live
//! balance state shown while it is still a draft. Everything here is a pure
//! function of its input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{JournalEntry, JournalLine};

/// Balance tolerance in minor units. `|difference| < tolerance` is balanced,
/// so with 1 öre only an exact match passes.
pub const DEFAULT_BALANCE_TOLERANCE_MINOR: i64 = 1;

/// Reasons a draft may not be posted
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("Entry date is missing")]
    MissingEntryDate,

    #[error("Line {line}: amounts must be non-negative")]
    NegativeAmount { line: usize },

    #[error("Line {line}: a line cannot carry both a debit and a credit")]
    BothSidesEntered { line: usize },

    #[error("Line {line}: an amount is entered without an account")]
    MissingAccount { line: usize },

    #[error("At least 2 lines with an account and a positive amount are required, got {0}")]
    InsufficientLines(usize),

    #[error("Line totals exceed the representable amount range")]
    AmountOverflow,

    #[error("Total debits ({total_debit_minor}) must equal total credits ({total_credit_minor})")]
    Unbalanced {
        total_debit_minor: i64,
        total_credit_minor: i64,
    },
}

impl ValidationError {
    /// Stable reason code for callers that branch on the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEntryDate => "MISSING_ENTRY_DATE",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::BothSidesEntered { .. } => "BOTH_SIDES_ENTERED",
            Self::MissingAccount { .. } => "MISSING_ACCOUNT",
            Self::InsufficientLines(_) => "INSUFFICIENT_LINES",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::Unbalanced { .. } => "UNBALANCED_ENTRY",
        }
    }
}

/// Live balance state of a set of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
    /// `total_debit_minor - total_credit_minor`
    pub difference_minor: i64,
    pub is_balanced: bool,
}

/// Compute totals with the default tolerance of one minor unit.
pub fn compute_totals(lines: &[JournalLine]) -> EntryTotals {
    compute_totals_with_tolerance(lines, DEFAULT_BALANCE_TOLERANCE_MINOR)
}

/// Compute totals; the entry is balanced when `|difference| < tolerance_minor`.
///
/// Sums are taken in `i128`. Totals that do not fit in `i64` saturate and
/// the entry is never balanced; `validate_for_post` rejects it with
/// `AmountOverflow`.
pub fn compute_totals_with_tolerance(lines: &[JournalLine], tolerance_minor: i64) -> EntryTotals {
    let (debit, credit) = side_sums(lines);
    let difference = debit - credit;
    let fits = i64::try_from(debit).is_ok() && i64::try_from(credit).is_ok();

    EntryTotals {
        total_debit_minor: saturate(debit),
        total_credit_minor: saturate(credit),
        difference_minor: saturate(difference),
        is_balanced: fits && difference.abs() < i128::from(tolerance_minor),
    }
}

fn side_sums(lines: &[JournalLine]) -> (i128, i128) {
    lines.iter().fold((0i128, 0i128), |(debit, credit), l| {
        (debit + i128::from(l.debit_minor), credit + i128::from(l.credit_minor))
    })
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// A line counts towards the two-line minimum when it has an account and a
/// strictly positive amount on one side.
fn is_effective_line(line: &JournalLine) -> bool {
    line.account_id.is_some() && (line.debit_minor > 0 || line.credit_minor > 0)
}

/// Validate a draft for posting with the default tolerance.
pub fn validate_for_post(entry: &JournalEntry) -> Result<EntryTotals, ValidationError> {
    validate_for_post_with_tolerance(entry, DEFAULT_BALANCE_TOLERANCE_MINOR)
}

/// Validate a draft for posting.
///
/// # Validation Rules
///
/// - `entry_date` must be present
/// - no line may carry a negative amount
/// - no line may carry both a debit and a credit
/// - no amount may be entered without an account (blank rows are ignored)
/// - at least 2 lines with an account and a positive amount
/// - total debit and total credit must each fit in `i64`
/// - `|total debit - total credit| < tolerance_minor`
///
/// Fiscal-year bounds and account existence are checked by the posting
/// service, which owns the store lookups.
pub fn validate_for_post_with_tolerance(
    entry: &JournalEntry,
    tolerance_minor: i64,
) -> Result<EntryTotals, ValidationError> {
    if entry.entry_date.is_none() {
        return Err(ValidationError::MissingEntryDate);
    }

    for (idx, line) in entry.lines.iter().enumerate() {
        if line.debit_minor < 0 || line.credit_minor < 0 {
            return Err(ValidationError::NegativeAmount { line: idx });
        }
        if line.debit_minor > 0 && line.credit_minor > 0 {
            return Err(ValidationError::BothSidesEntered { line: idx });
        }
        if line.account_id.is_none() && (line.debit_minor > 0 || line.credit_minor > 0) {
            return Err(ValidationError::MissingAccount { line: idx });
        }
    }

    let effective = entry.lines.iter().filter(|l| is_effective_line(l)).count();
    if effective < 2 {
        return Err(ValidationError::InsufficientLines(effective));
    }

    let (debit, credit) = side_sums(&entry.lines);
    if i64::try_from(debit).is_err() || i64::try_from(credit).is_err() {
        return Err(ValidationError::AmountOverflow);
    }

    let totals = compute_totals_with_tolerance(&entry.lines, tolerance_minor);
    if !totals.is_balanced {
        return Err(ValidationError::Unbalanced {
            total_debit_minor: totals.total_debit_minor,
            total_credit_minor: totals.total_credit_minor,
        });
    }

    Ok(totals)
}
