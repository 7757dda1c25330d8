//! In-memory implementation of the BookkeepingStore trait for tests and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookkeepingStore, EntryFilter, StoreError, StoreResult};
use crate::models::{Account, FiscalYear, JournalEntry};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    fiscal_years: HashMap<Uuid, FiscalYear>,
    entries: HashMap<Uuid, JournalEntry>,
}

/// Store backed by hash maps behind a Tokio `RwLock`
///
/// Enforces the same constraints a database schema would: unique
/// verification numbers per organization and non-overlapping fiscal years.
/// Listing order is unspecified, so callers must sort what they read.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the chart of accounts. The catalog is read-only to the core,
    /// so this is not part of the store trait.
    pub async fn insert_account(&self, account: Account) {
        let mut inner = self.inner.write().await;
        inner.accounts.insert(account.id, account);
    }
}

#[async_trait]
impl BookkeepingStore for InMemoryStore {
    async fn list_accounts(&self, organization_id: Uuid) -> StoreResult<Vec<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn find_account(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .get(&account_id)
            .filter(|a| a.organization_id == organization_id)
            .cloned())
    }

    async fn list_fiscal_years(&self, organization_id: Uuid) -> StoreResult<Vec<FiscalYear>> {
        let inner = self.inner.read().await;
        Ok(inner
            .fiscal_years
            .values()
            .filter(|fy| fy.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn find_fiscal_year(
        &self,
        organization_id: Uuid,
        fiscal_year_id: Uuid,
    ) -> StoreResult<Option<FiscalYear>> {
        let inner = self.inner.read().await;
        Ok(inner
            .fiscal_years
            .get(&fiscal_year_id)
            .filter(|fy| fy.organization_id == organization_id)
            .cloned())
    }

    async fn insert_fiscal_year(&self, fiscal_year: &FiscalYear) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let overlapping = inner.fiscal_years.values().any(|fy| {
            fy.organization_id == fiscal_year.organization_id && fy.overlaps(fiscal_year)
        });
        if overlapping {
            return Err(StoreError::Conflict(format!(
                "fiscal year {} overlaps an existing fiscal year",
                fiscal_year.id
            )));
        }
        inner.fiscal_years.insert(fiscal_year.id, fiscal_year.clone());
        Ok(())
    }

    async fn update_fiscal_year(&self, fiscal_year: &FiscalYear) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.fiscal_years.get_mut(&fiscal_year.id) {
            Some(existing) if existing.organization_id == fiscal_year.organization_id => {
                *existing = fiscal_year.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "fiscal year",
                id: fiscal_year.id,
            }),
        }
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn find_entry(
        &self,
        organization_id: Uuid,
        entry_id: Uuid,
    ) -> StoreResult<Option<JournalEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .get(&entry_id)
            .filter(|e| e.organization_id == organization_id)
            .cloned())
    }

    async fn insert_entry(&self, entry: &JournalEntry) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&entry.id) {
            return Err(StoreError::Conflict(format!(
                "journal entry {} already exists",
                entry.id
            )));
        }
        ensure_unique_verification_number(&inner, entry)?;
        inner.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_entry(&self, entry: &JournalEntry) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner
            .entries
            .get(&entry.id)
            .is_some_and(|e| e.organization_id == entry.organization_id)
        {
            return Err(StoreError::NotFound {
                entity: "journal entry",
                id: entry.id,
            });
        }
        ensure_unique_verification_number(&inner, entry)?;
        inner.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn next_verification_number(&self, organization_id: Uuid) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        let max = inner
            .entries
            .values()
            .filter(|e| e.organization_id == organization_id)
            .filter_map(|e| e.verification_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }
}

fn ensure_unique_verification_number(inner: &Inner, entry: &JournalEntry) -> StoreResult<()> {
    let Some(number) = entry.verification_number else {
        return Ok(());
    };
    let taken = inner.entries.values().any(|other| {
        other.id != entry.id
            && other.organization_id == entry.organization_id
            && other.verification_number == Some(number)
    });
    if taken {
        return Err(StoreError::DuplicateVerificationNumber {
            organization_id: entry.organization_id,
            verification_number: number,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountClass, EntryStatus, JournalLine};
    use chrono::{NaiveDate, Utc};

    fn fiscal_year(org: Uuid, year: i32) -> FiscalYear {
        FiscalYear {
            id: Uuid::new_v4(),
            organization_id: org,
            name: format!("{}", year),
            start_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            is_closed: false,
            created_at: Utc::now(),
        }
    }

    fn posted_entry(org: Uuid, fy: Uuid, number: i64) -> JournalEntry {
        let mut entry = JournalEntry::new_draft(
            org,
            fy,
            NaiveDate::from_ymd_opt(2024, 1, 10),
            "Test",
            vec![
                JournalLine::debit(Uuid::new_v4(), 100),
                JournalLine::credit(Uuid::new_v4(), 100),
            ],
        );
        entry.status = EntryStatus::Posted;
        entry.verification_number = Some(number);
        entry
    }

    #[tokio::test]
    async fn test_accounts_are_scoped_by_organization() {
        let store = InMemoryStore::new();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let account = Account {
            id: Uuid::new_v4(),
            organization_id: org_a,
            account_number: "1930".to_string(),
            name: "Företagskonto".to_string(),
            name_english: Some("Business account".to_string()),
            account_class: AccountClass::Asset,
        };
        store.insert_account(account.clone()).await;

        assert_eq!(store.find_account(org_a, account.id).await.unwrap(), Some(account.clone()));
        assert_eq!(store.find_account(org_b, account.id).await.unwrap(), None);
        assert!(store.list_accounts(org_b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_fiscal_year_rejected() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        store.insert_fiscal_year(&fiscal_year(org, 2024)).await.unwrap();

        let mut overlapping = fiscal_year(org, 2024);
        overlapping.start_date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        overlapping.end_date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();

        assert!(matches!(
            store.insert_fiscal_year(&overlapping).await,
            Err(StoreError::Conflict(_))
        ));

        // Another organization may use the same dates
        store.insert_fiscal_year(&fiscal_year(Uuid::new_v4(), 2024)).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_verification_number_rejected() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        let fy = Uuid::new_v4();

        store.insert_entry(&posted_entry(org, fy, 1)).await.unwrap();
        let err = store.insert_entry(&posted_entry(org, fy, 1)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateVerificationNumber {
                organization_id: org,
                verification_number: 1,
            }
        );

        // Numbering is per organization
        store.insert_entry(&posted_entry(Uuid::new_v4(), fy, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_next_verification_number() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        let fy = Uuid::new_v4();
        assert_eq!(store.next_verification_number(org).await.unwrap(), 1);

        store.insert_entry(&posted_entry(org, fy, 1)).await.unwrap();
        store.insert_entry(&posted_entry(org, fy, 2)).await.unwrap();
        assert_eq!(store.next_verification_number(org).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_entry() {
        let store = InMemoryStore::new();
        let entry = posted_entry(Uuid::new_v4(), Uuid::new_v4(), 1);
        assert!(matches!(
            store.update_entry(&entry).await,
            Err(StoreError::NotFound { entity: "journal entry", .. })
        ));
    }

    #[tokio::test]
    async fn test_list_entries_filter() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        let fy = Uuid::new_v4();
        store.insert_entry(&posted_entry(org, fy, 1)).await.unwrap();

        let draft = JournalEntry::new_draft(org, fy, None, "Utkast", vec![]);
        store.insert_entry(&draft).await.unwrap();

        assert_eq!(store.list_entries(&EntryFilter::organization(org)).await.unwrap().len(), 2);
        assert_eq!(store.list_entries(&EntryFilter::posted(org)).await.unwrap().len(), 1);
        assert_eq!(
            store
                .list_entries(&EntryFilter::posted(org).in_fiscal_year(Some(Uuid::new_v4())))
                .await
                .unwrap()
                .len(),
            0
        );
    }
}
