//! Journal Entry Draft V1 Contract Types
//!
//! Input shape for a draft entry as handed over by the presentation layer.
//! String form inputs are parsed before they get here: amounts arrive as
//! `Decimal` and are converted to minor units exactly once, in
//! [`JournalEntryDraftV1::into_draft`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{JournalEntry, JournalLine, VatDetail, VatDirection};
use crate::money::{to_minor, MoneyError};

/// Draft journal entry payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntryDraftV1 {
    pub fiscal_year_id: Uuid,

    /// Accounting date (YYYY-MM-DD); may be absent while editing
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,

    pub description: String,

    pub lines: Vec<JournalLineV1>,
}

/// A single line of a draft
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalLineV1 {
    #[serde(default)]
    pub account_id: Option<Uuid>,

    #[serde(default)]
    pub debit: Decimal,

    #[serde(default)]
    pub credit: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat: Option<VatLineV1>,
}

/// VAT breakdown attached to a line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VatLineV1 {
    pub direction: VatDirection,
    pub rate: Decimal,
    pub tax_base: Decimal,
    pub vat_amount: Decimal,
}

impl JournalEntryDraftV1 {
    /// Convert into a draft entry for `organization_id`.
    ///
    /// # Errors
    /// Returns `MoneyError` if an amount does not fit in minor units.
    pub fn into_draft(
        self,
        organization_id: Uuid,
        minor_unit_decimals: u32,
    ) -> Result<JournalEntry, MoneyError> {
        let lines = self
            .lines
            .into_iter()
            .map(|line| line.into_line(minor_unit_decimals))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JournalEntry::new_draft(
            organization_id,
            self.fiscal_year_id,
            self.entry_date,
            self.description,
            lines,
        ))
    }
}

impl JournalLineV1 {
    fn into_line(self, decimals: u32) -> Result<JournalLine, MoneyError> {
        let vat = self
            .vat
            .map(|v| -> Result<VatDetail, MoneyError> {
                Ok(VatDetail {
                    direction: v.direction,
                    rate: v.rate.normalize(),
                    tax_base_minor: to_minor(v.tax_base, decimals)?,
                    vat_amount_minor: to_minor(v.vat_amount, decimals)?,
                })
            })
            .transpose()?;

        Ok(JournalLine {
            account_id: self.account_id,
            debit_minor: to_minor(self.debit, decimals)?,
            credit_minor: to_minor(self.credit, decimals)?,
            description: self.description,
            line_order: 0,
            vat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_valid_payload() {
        let json = r#"{
            "fiscal_year_id": "550e8400-e29b-41d4-a716-446655440000",
            "entry_date": "2024-02-11",
            "description": "Faktura 1001",
            "lines": [
                {
                    "account_id": "6f1c2c55-8d0b-4b6e-9f3a-2f7f5c3f0a11",
                    "debit": "1000.00"
                },
                {
                    "account_id": "0a6a2f44-1b3c-4d5e-8f9a-0b1c2d3e4f50",
                    "credit": "1000.00",
                    "vat": {
                        "direction": "output",
                        "rate": "25",
                        "tax_base": "800.00",
                        "vat_amount": "200.00"
                    }
                }
            ]
        }"#;

        let payload: JournalEntryDraftV1 = serde_json::from_str(json).unwrap();
        assert_eq!(payload.lines.len(), 2);
        assert_eq!(payload.lines[0].debit, dec!(1000.00));
        assert_eq!(payload.lines[0].credit, Decimal::ZERO);
        assert_eq!(payload.lines[1].vat.as_ref().unwrap().direction, VatDirection::Output);
    }

    #[test]
    fn test_into_draft_converts_to_minor_units() {
        let payload = JournalEntryDraftV1 {
            fiscal_year_id: Uuid::new_v4(),
            entry_date: NaiveDate::from_ymd_opt(2024, 2, 11),
            description: "Kontorsmaterial".to_string(),
            lines: vec![
                JournalLineV1 {
                    account_id: Some(Uuid::new_v4()),
                    debit: dec!(125.005),
                    credit: Decimal::ZERO,
                    description: None,
                    vat: None,
                },
                JournalLineV1 {
                    account_id: Some(Uuid::new_v4()),
                    debit: Decimal::ZERO,
                    credit: dec!(125.01),
                    description: Some("Bank".to_string()),
                    vat: Some(VatLineV1 {
                        direction: VatDirection::Input,
                        rate: dec!(25.00),
                        tax_base: dec!(100.00),
                        vat_amount: dec!(25.00),
                    }),
                },
            ],
        };

        let org = Uuid::new_v4();
        let draft = payload.into_draft(org, 2).unwrap();

        assert_eq!(draft.organization_id, org);
        assert_eq!(draft.status, EntryStatus::Draft);
        assert_eq!(draft.lines[0].debit_minor, 12501);
        assert_eq!(draft.lines[1].credit_minor, 12501);
        assert_eq!(draft.lines[1].line_order, 2);

        let vat = draft.lines[1].vat.as_ref().unwrap();
        assert_eq!(vat.rate, dec!(25));
        assert_eq!(vat.tax_base_minor, 10000);
        assert_eq!(vat.vat_amount_minor, 2500);
    }
}
