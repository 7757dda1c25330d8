//! Bookkeeping domain models
//!
//! Reference data (accounts, fiscal years) and the journal itself, as
//! supplied by the external store. Projections computed from these live in
//! the service modules and are never stored back.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Explicit organization / fiscal-year selection threaded into every
/// store-backed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgContext {
    pub organization_id: Uuid,
    pub fiscal_year_id: Option<Uuid>,
}

impl OrgContext {
    pub fn new(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            fiscal_year_id: None,
        }
    }

    pub fn with_fiscal_year(mut self, fiscal_year_id: Uuid) -> Self {
        self.fiscal_year_id = Some(fiscal_year_id);
        self
    }
}

/// Account class derived from the BAS account number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountClass {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountClass {
    /// Classify a BAS account number (1000-8999).
    ///
    /// Returns `None` for numbers outside the four-digit chart.
    pub fn from_account_number(account_number: &str) -> Option<Self> {
        if account_number.len() != 4 || !account_number.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let bytes = account_number.as_bytes();
        let first = bytes[0] - b'0';
        let second = bytes[1] - b'0';

        match first {
            1 => Some(AccountClass::Asset),
            2 if second == 0 => Some(AccountClass::Equity),
            2 => Some(AccountClass::Liability),
            3 => Some(AccountClass::Revenue),
            4..=7 => Some(AccountClass::Expense),
            8 if second <= 3 => Some(AccountClass::Revenue),
            8 => Some(AccountClass::Expense),
            _ => None,
        }
    }

    /// Balance-sheet accounts carry their balance across fiscal years;
    /// income-statement accounts restart at every fiscal-year start.
    pub fn is_balance_sheet(&self) -> bool {
        matches!(
            self,
            AccountClass::Asset | AccountClass::Liability | AccountClass::Equity
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountClass::Asset => "asset",
            AccountClass::Liability => "liability",
            AccountClass::Equity => "equity",
            AccountClass::Revenue => "revenue",
            AccountClass::Expense => "expense",
        }
    }
}

/// Chart-of-accounts entry (read-only to the core)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub account_number: String,
    pub name: String,
    pub name_english: Option<String>,
    pub account_class: AccountClass,
}

/// Accounting period of an organization. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_closed: bool,
    pub created_at: DateTime<Utc>,
}

impl FiscalYear {
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn overlaps(&self, other: &FiscalYear) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Voided,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Posted => write!(f, "posted"),
            Self::Voided => write!(f, "voided"),
        }
    }
}

/// VAT direction: output (sales) or input (purchases)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VatDirection {
    Output,
    Input,
}

/// VAT information carried by a journal line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatDetail {
    pub direction: VatDirection,
    /// Rate in percent, e.g. 25
    pub rate: Decimal,
    /// Net amount the tax is computed on (signed; credit notes are negative)
    pub tax_base_minor: i64,
    pub vat_amount_minor: i64,
}

/// A single debit or credit line of a journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: Option<Uuid>,
    pub debit_minor: i64,
    pub credit_minor: i64,
    pub description: Option<String>,
    pub line_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat: Option<VatDetail>,
}

impl JournalLine {
    pub fn debit(account_id: Uuid, amount_minor: i64) -> Self {
        Self {
            account_id: Some(account_id),
            debit_minor: amount_minor,
            credit_minor: 0,
            description: None,
            line_order: 0,
            vat: None,
        }
    }

    pub fn credit(account_id: Uuid, amount_minor: i64) -> Self {
        Self {
            account_id: Some(account_id),
            debit_minor: 0,
            credit_minor: amount_minor,
            description: None,
            line_order: 0,
            vat: None,
        }
    }

    pub fn with_vat(mut self, vat: VatDetail) -> Self {
        self.vat = Some(vat);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Signed effect on the account balance (debit positive), `None` on
    /// overflow
    pub fn net_minor(&self) -> Option<i64> {
        self.debit_minor.checked_sub(self.credit_minor)
    }

    /// Last-write-wins: entering a positive debit clears the credit side.
    pub fn enter_debit(&mut self, amount_minor: i64) {
        self.debit_minor = amount_minor;
        if amount_minor > 0 {
            self.credit_minor = 0;
        }
    }

    /// Last-write-wins: entering a positive credit clears the debit side.
    pub fn enter_credit(&mut self, amount_minor: i64) {
        self.credit_minor = amount_minor;
        if amount_minor > 0 {
            self.debit_minor = 0;
        }
    }
}

/// Journal entry (verifikation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub fiscal_year_id: Uuid,
    pub entry_date: Option<NaiveDate>,
    pub description: String,
    /// Assigned at posting time, immutable afterwards
    pub verification_number: Option<i64>,
    pub status: EntryStatus,
    pub lines: Vec<JournalLine>,
    pub posted_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    /// Set on drafts created as the reversal of a posted entry
    pub reverses_entry_id: Option<Uuid>,
}

impl JournalEntry {
    pub fn new_draft(
        organization_id: Uuid,
        fiscal_year_id: Uuid,
        entry_date: Option<NaiveDate>,
        description: impl Into<String>,
        lines: Vec<JournalLine>,
    ) -> Self {
        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(idx, mut line)| {
                line.line_order = (idx + 1) as i32;
                line
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            organization_id,
            fiscal_year_id,
            entry_date,
            description: description.into(),
            verification_number: None,
            status: EntryStatus::Draft,
            lines,
            posted_at: None,
            voided_at: None,
            void_reason: None,
            reverses_entry_id: None,
        }
    }

    pub fn is_posted(&self) -> bool {
        self.status == EntryStatus::Posted
    }
}
