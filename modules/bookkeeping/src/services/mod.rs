//! Bookkeeping services
//!
//! Each service pairs pure computations over already-fetched records with
//! thin async wrappers that fetch through [`crate::repos::BookkeepingStore`].

pub mod financial_report_service;
pub mod fiscal_year_service;
pub mod journal_service;
pub mod ledger_service;
pub mod trial_balance_service;
pub mod vat_service;
