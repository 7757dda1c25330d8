pub mod config;
pub mod contracts;
pub mod models;
pub mod money;
pub mod repos;
pub mod services;
pub mod validation;

pub use config::{init_tracing, Config, ConfigError};
pub use models::{
    Account, AccountClass, EntryStatus, FiscalYear, JournalEntry, JournalLine, OrgContext,
    VatDetail, VatDirection,
};
pub use repos::{BookkeepingStore, InMemoryStore, StoreError};
pub use validation::{compute_totals, validate_for_post, EntryTotals, ValidationError};
