//! Common test utilities for bookkeeping integration tests
//!
//! Every test gets its own [`InMemoryStore`] and organization, seeded with a
//! small BAS chart of accounts.
//!
//! ## Usage
//! ```rust
//! use common::TestBook;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let book = TestBook::new().await;
//!     let fy = book.fiscal_year(2024).await;
//!     // use book.store, book.ctx(), book.account("1930")...
//! }
//! ```

#![allow(dead_code)]

use std::collections::HashMap;

use bookkeeping_rs::contracts::FiscalYearTransition;
use bookkeeping_rs::models::{
    Account, AccountClass, FiscalYear, JournalEntry, JournalLine, OrgContext,
};
use bookkeeping_rs::services::fiscal_year_service::{self, FiscalYearError};
use bookkeeping_rs::services::journal_service;
use bookkeeping_rs::{Config, InMemoryStore};
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Chart of accounts seeded for every test organization
pub const TEST_ACCOUNTS: &[(&str, &str)] = &[
    ("1510", "Kundfordringar"),
    ("1930", "Företagskonto"),
    ("2081", "Aktiekapital"),
    ("2440", "Leverantörsskulder"),
    ("2611", "Utgående moms 25 %"),
    ("2621", "Utgående moms 12 %"),
    ("2631", "Utgående moms 6 %"),
    ("2641", "Debiterad ingående moms"),
    ("3011", "Försäljning tjänster 25 %"),
    ("3002", "Försäljning varor 12 %"),
    ("4010", "Inköp material och varor"),
    ("5010", "Lokalhyra"),
    ("6110", "Kontorsmateriel"),
];

pub struct TestBook {
    pub store: InMemoryStore,
    pub organization_id: Uuid,
    pub config: Config,
    accounts: HashMap<String, Account>,
}

impl TestBook {
    pub async fn new() -> Self {
        let config = Config::default();
        init_test_tracing(&config);

        let store = InMemoryStore::new();
        let organization_id = Uuid::new_v4();
        let mut accounts = HashMap::new();

        for (number, name) in TEST_ACCOUNTS {
            let account = Account {
                id: Uuid::new_v4(),
                organization_id,
                account_number: number.to_string(),
                name: name.to_string(),
                name_english: None,
                account_class: AccountClass::from_account_number(number)
                    .expect("test account numbers are valid BAS numbers"),
            };
            store.insert_account(account.clone()).await;
            accounts.insert(number.to_string(), account);
        }

        Self {
            store,
            organization_id,
            config,
            accounts,
        }
    }

    pub fn ctx(&self) -> OrgContext {
        OrgContext::new(self.organization_id)
    }

    pub fn account(&self, number: &str) -> &Account {
        self.accounts
            .get(number)
            .unwrap_or_else(|| panic!("account {} not seeded", number))
    }

    pub fn account_id(&self, number: &str) -> Uuid {
        self.account(number).id
    }

    /// Create a calendar fiscal year
    pub async fn fiscal_year(&self, year: i32) -> FiscalYear {
        fiscal_year_service::create_fiscal_year(
            &self.store,
            self.organization_id,
            &year.to_string(),
            date(year, 1, 1),
            date(year, 12, 31),
        )
        .await
        .expect("Failed to create fiscal year")
    }

    /// Close a fiscal year as the test auditor
    pub async fn close(
        &self,
        fiscal_year_id: Uuid,
    ) -> Result<FiscalYearTransition, FiscalYearError> {
        fiscal_year_service::close_fiscal_year(
            &self.store,
            &self.config,
            self.organization_id,
            fiscal_year_id,
            "revisor",
            None,
        )
        .await
    }

    pub async fn reopen(
        &self,
        fiscal_year_id: Uuid,
    ) -> Result<FiscalYearTransition, FiscalYearError> {
        fiscal_year_service::reopen_fiscal_year(
            &self.store,
            self.organization_id,
            fiscal_year_id,
            "revisor",
            None,
        )
        .await
    }

    pub fn debit(&self, number: &str, amount_minor: i64) -> JournalLine {
        JournalLine::debit(self.account_id(number), amount_minor)
    }

    pub fn credit(&self, number: &str, amount_minor: i64) -> JournalLine {
        JournalLine::credit(self.account_id(number), amount_minor)
    }

    /// Create a draft without posting it
    pub async fn draft(
        &self,
        fiscal_year: &FiscalYear,
        entry_date: NaiveDate,
        description: &str,
        lines: Vec<JournalLine>,
    ) -> JournalEntry {
        let draft = JournalEntry::new_draft(
            self.organization_id,
            fiscal_year.id,
            Some(entry_date),
            description,
            lines,
        );
        journal_service::create_draft(&self.store, &self.ctx(), draft)
            .await
            .expect("Failed to create draft")
    }

    /// Create and post an entry
    pub async fn post(
        &self,
        fiscal_year: &FiscalYear,
        entry_date: NaiveDate,
        description: &str,
        lines: Vec<JournalLine>,
    ) -> JournalEntry {
        let draft = self.draft(fiscal_year, entry_date, description, lines).await;
        journal_service::post_entry(&self.store, &self.ctx(), &self.config, draft.id)
            .await
            .expect("Failed to post entry")
    }
}

/// Route log output through the test harness so it is captured per test
fn init_test_tracing(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_test_writer()
        .try_init();
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
