//! VAT Report Service
//!
//! Groups line-level VAT of posted entries by rate, separately for the
//! output (sales) and input (purchase) side, and maps the result onto the
//! Swedish VAT return (momsdeklaration).
//!
//! Sign convention: `net_vat_minor = output - input`. Non-negative means
//! VAT payable, negative means a refund is due.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{JournalEntry, OrgContext, VatDirection};
use crate::money::checked_sum;
use crate::repos::{BookkeepingStore, EntryFilter, StoreError};

/// Statutory Swedish rates, in report order
const STATUTORY_RATES: [u32; 4] = [25, 12, 6, 0];

#[derive(Debug, Error, PartialEq)]
pub enum VatError {
    #[error("Invalid date range: start {start_date} is after end {end_date}")]
    InvalidRange {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("VAT totals exceed the representable amount range")]
    AmountOverflow,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Totals for one VAT rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatGroup {
    pub rate: Decimal,
    pub tax_base_minor: i64,
    pub vat_amount_minor: i64,
    /// Number of distinct entries with a line at this rate
    pub transaction_count: usize,
}

/// One side (output or input) of the report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VatSide {
    pub rate_groups: Vec<VatGroup>,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub output_vat: VatSide,
    pub input_vat: VatSide,
    pub net_vat_minor: i64,
}

/// Figures for the boxes of the Swedish VAT return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatDeclaration {
    /// Ruta 05: taxable sales (output tax base at non-zero rates)
    pub box_05_taxable_sales_minor: i64,
    /// Ruta 10: output VAT at 25 %
    pub box_10_output_vat_25_minor: i64,
    /// Ruta 11: output VAT at 12 %
    pub box_11_output_vat_12_minor: i64,
    /// Ruta 12: output VAT at 6 %
    pub box_12_output_vat_6_minor: i64,
    /// Ruta 48: deductible input VAT
    pub box_48_input_vat_minor: i64,
    /// Ruta 49: VAT to pay (negative: to be refunded)
    pub box_49_net_vat_minor: i64,
}

impl VatSide {
    pub fn group(&self, rate: Decimal) -> Option<&VatGroup> {
        self.rate_groups.iter().find(|g| g.rate == rate.normalize())
    }

    fn vat_at(&self, rate: u32) -> i64 {
        self.group(Decimal::from(rate))
            .map_or(0, |g| g.vat_amount_minor)
    }
}

impl VatReport {
    pub fn is_payable(&self) -> bool {
        self.net_vat_minor >= 0
    }

    pub fn declaration(&self) -> Result<VatDeclaration, VatError> {
        let taxable = self.output_vat.rate_groups.iter().filter(|g| !g.rate.is_zero());
        let box_05_taxable_sales_minor =
            checked_sum(taxable.map(|g| g.tax_base_minor)).ok_or(VatError::AmountOverflow)?;

        Ok(VatDeclaration {
            box_05_taxable_sales_minor,
            box_10_output_vat_25_minor: self.output_vat.vat_at(25),
            box_11_output_vat_12_minor: self.output_vat.vat_at(12),
            box_12_output_vat_6_minor: self.output_vat.vat_at(6),
            box_48_input_vat_minor: self.input_vat.total_minor,
            box_49_net_vat_minor: self.net_vat_minor,
        })
    }
}

/// Statutory rates first (25, 12, 6, 0), then other rates descending
fn compare_rates(a: &Decimal, b: &Decimal) -> std::cmp::Ordering {
    let rank = |rate: &Decimal| {
        STATUTORY_RATES
            .iter()
            .position(|r| Decimal::from(*r) == *rate)
    };
    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

#[derive(Default)]
struct RateTotals {
    tax_base_minor: i64,
    vat_amount_minor: i64,
    entry_ids: HashSet<Uuid>,
}

fn build_side(groups: HashMap<Decimal, RateTotals>) -> Result<VatSide, VatError> {
    let mut rate_groups: Vec<VatGroup> = groups
        .into_iter()
        .map(|(rate, totals)| VatGroup {
            rate,
            tax_base_minor: totals.tax_base_minor,
            vat_amount_minor: totals.vat_amount_minor,
            transaction_count: totals.entry_ids.len(),
        })
        .collect();
    rate_groups.sort_by(|a, b| compare_rates(&a.rate, &b.rate));
    let total_minor = checked_sum(rate_groups.iter().map(|g| g.vat_amount_minor))
        .ok_or(VatError::AmountOverflow)?;
    Ok(VatSide {
        rate_groups,
        total_minor,
    })
}

/// Aggregate VAT of posted entries dated within `[start_date, end_date]`
pub fn aggregate_vat(
    entries: &[JournalEntry],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<VatReport, VatError> {
    let mut output: HashMap<Decimal, RateTotals> = HashMap::new();
    let mut input: HashMap<Decimal, RateTotals> = HashMap::new();

    let in_range = entries.iter().filter(|e| {
        e.is_posted()
            && e
                .entry_date
                .is_some_and(|d| d >= start_date && d <= end_date)
    });

    for entry in in_range {
        for vat in entry.lines.iter().filter_map(|l| l.vat.as_ref()) {
            let groups = match vat.direction {
                VatDirection::Output => &mut output,
                VatDirection::Input => &mut input,
            };
            let totals = groups.entry(vat.rate.normalize()).or_default();
            totals.tax_base_minor = totals
                .tax_base_minor
                .checked_add(vat.tax_base_minor)
                .ok_or(VatError::AmountOverflow)?;
            totals.vat_amount_minor = totals
                .vat_amount_minor
                .checked_add(vat.vat_amount_minor)
                .ok_or(VatError::AmountOverflow)?;
            totals.entry_ids.insert(entry.id);
        }
    }

    let output_vat = build_side(output)?;
    let input_vat = build_side(input)?;
    let net_vat_minor = output_vat
        .total_minor
        .checked_sub(input_vat.total_minor)
        .ok_or(VatError::AmountOverflow)?;

    Ok(VatReport {
        start_date,
        end_date,
        output_vat,
        input_vat,
        net_vat_minor,
    })
}

/// VAT report for an organization and date range
pub async fn get_vat_report(
    store: &dyn BookkeepingStore,
    ctx: &OrgContext,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<VatReport, VatError> {
    if start_date > end_date {
        return Err(VatError::InvalidRange {
            start_date,
            end_date,
        });
    }

    let entries = store
        .list_entries(&EntryFilter::posted(ctx.organization_id))
        .await?;
    let report = aggregate_vat(&entries, start_date, end_date)?;

    tracing::debug!(
        organization_id = %ctx.organization_id,
        start_date = %start_date,
        end_date = %end_date,
        net_vat_minor = report.net_vat_minor,
        "VAT report computed"
    );

    Ok(report)
}
