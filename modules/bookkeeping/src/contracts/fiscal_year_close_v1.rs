//! Fiscal Year Close V1 Contract Types
//!
//! Result types for the fiscal-year close lifecycle:
//! - Validate Close: pre-flight report before closing a fiscal year
//! - Close / Reopen: explicit state transitions with an audit record
//!
//! All operations are organization-scoped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================
// Validate Close
// ============================================================

/// Structured validation report
///
/// Machine-readable validation results with severity levels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CloseValidationReport {
    pub fiscal_year_id: Uuid,
    pub organization_id: Uuid,
    pub can_close: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Individual validation issue
///
/// Structured error/warning with stable code for client handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,

    /// Stable code, e.g. "FISCAL_YEAR_ALREADY_CLOSED", "DRAFT_ENTRIES_REMAIN"
    pub code: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Validation issue severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationSeverity {
    /// Blocks close operation
    Error,

    /// Should be addressed but doesn't block close
    Warning,
}

// ============================================================
// Close / Reopen
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiscalYearState {
    Open,
    Closed,
}

/// Audit record of a close or reopen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiscalYearTransition {
    pub fiscal_year_id: Uuid,
    pub organization_id: Uuid,
    pub from: FiscalYearState,
    pub to: FiscalYearState,

    /// User or system identifier performing the transition
    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// SHA-256 over the posted journal of the year at transition time.
    /// On close this seals the year; on reopen it is the seal being broken.
    pub close_hash: String,

    pub posted_entry_count: i64,
    pub total_debits_minor: i64,
    pub total_credits_minor: i64,
    pub transitioned_at: DateTime<Utc>,
}
