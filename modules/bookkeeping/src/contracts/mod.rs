//! Contract types exchanged with the presentation layer
//!
//! Inputs arrive already parsed into strict types; outputs are plain
//! serializable structures.

pub mod fiscal_year_close_v1;
pub mod journal_entry_draft_v1;

pub use fiscal_year_close_v1::*;
pub use journal_entry_draft_v1::*;
