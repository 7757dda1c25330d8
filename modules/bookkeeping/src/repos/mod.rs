//! Store seam for the external persistence layer
//!
//! The core never persists anything itself. Accounts, fiscal years and
//! journal entries are fetched through [`BookkeepingStore`] as a single
//! request/response call per query, and state changes (posting, voiding,
//! closing a fiscal year) are handed back through it. Uniqueness and
//! overlap constraints are the store's to enforce; the core propagates
//! the resulting errors unchanged.

pub mod memory_store;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, EntryStatus, FiscalYear, JournalEntry};

pub use memory_store::InMemoryStore;

/// Errors surfaced by the store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(
        "Verification number {verification_number} already used in organization {organization_id}"
    )]
    DuplicateVerificationNumber {
        organization_id: Uuid,
        verification_number: i64,
    },

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for listing journal entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFilter {
    pub organization_id: Uuid,
    pub fiscal_year_id: Option<Uuid>,
    pub status: Option<EntryStatus>,
}

impl EntryFilter {
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            fiscal_year_id: None,
            status: None,
        }
    }

    pub fn posted(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            fiscal_year_id: None,
            status: Some(EntryStatus::Posted),
        }
    }

    pub fn in_fiscal_year(mut self, fiscal_year_id: Option<Uuid>) -> Self {
        self.fiscal_year_id = fiscal_year_id;
        self
    }

    pub fn matches(&self, entry: &JournalEntry) -> bool {
        entry.organization_id == self.organization_id
            && self.fiscal_year_id.map_or(true, |fy| entry.fiscal_year_id == fy)
            && self.status.map_or(true, |s| entry.status == s)
    }
}

/// External persistence collaborator
#[async_trait]
pub trait BookkeepingStore: Send + Sync {
    async fn list_accounts(&self, organization_id: Uuid) -> StoreResult<Vec<Account>>;

    async fn find_account(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<Option<Account>>;

    async fn list_fiscal_years(&self, organization_id: Uuid) -> StoreResult<Vec<FiscalYear>>;

    async fn find_fiscal_year(
        &self,
        organization_id: Uuid,
        fiscal_year_id: Uuid,
    ) -> StoreResult<Option<FiscalYear>>;

    async fn insert_fiscal_year(&self, fiscal_year: &FiscalYear) -> StoreResult<()>;

    async fn update_fiscal_year(&self, fiscal_year: &FiscalYear) -> StoreResult<()>;

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>>;

    async fn find_entry(
        &self,
        organization_id: Uuid,
        entry_id: Uuid,
    ) -> StoreResult<Option<JournalEntry>>;

    async fn insert_entry(&self, entry: &JournalEntry) -> StoreResult<()>;

    /// Replace a stored entry. Must reject a verification number already
    /// held by another entry of the same organization.
    async fn update_entry(&self, entry: &JournalEntry) -> StoreResult<()>;

    /// Next free verification number for the organization
    async fn next_verification_number(&self, organization_id: Uuid) -> StoreResult<i64>;
}
