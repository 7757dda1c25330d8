//! VAT aggregation over posted entries in the store

mod common;

use bookkeeping_rs::models::{VatDetail, VatDirection};
use bookkeeping_rs::services::journal_service;
use bookkeeping_rs::services::vat_service::{self, VatError, VatReport};
use chrono::NaiveDate;
use common::{date, TestBook};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn vat(direction: VatDirection, rate: Decimal, base: i64, amount: i64) -> VatDetail {
    VatDetail {
        direction,
        rate,
        tax_base_minor: base,
        vat_amount_minor: amount,
    }
}

async fn vat_report(
    book: &TestBook,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<VatReport, VatError> {
    vat_service::get_vat_report(&book.store, &book.ctx(), start_date, end_date).await
}

#[tokio::test]
async fn test_group_sums_reconcile_with_totals() {
    let book = TestBook::new().await;
    let fy = book.fiscal_year(2024).await;

    // Sale at 25 %
    book.post(
        &fy,
        date(2024, 1, 10),
        "Faktura 1",
        vec![
            book.debit("1510", 125000),
            book.credit("3011", 100000),
            book.credit("2611", 25000)
                .with_vat(vat(VatDirection::Output, dec!(25), 100000, 25000)),
        ],
    )
    .await;
    // Sale at 12 %
    book.post(
        &fy,
        date(2024, 1, 12),
        "Faktura 2",
        vec![
            book.debit("1510", 11200),
            book.credit("3002", 10000),
            book.credit("2621", 1200)
                .with_vat(vat(VatDirection::Output, dec!(12), 10000, 1200)),
        ],
    )
    .await;
    // Another sale at 25 %
    book.post(
        &fy,
        date(2024, 2, 2),
        "Faktura 3",
        vec![
            book.debit("1930", 6250),
            book.credit("3011", 5000),
            book.credit("2611", 1250)
                .with_vat(vat(VatDirection::Output, dec!(25), 5000, 1250)),
        ],
    )
    .await;
    // Purchase at 25 %
    book.post(
        &fy,
        date(2024, 2, 15),
        "Leverantörsfaktura",
        vec![
            book.debit("4010", 40000),
            book.debit("2641", 10000)
                .with_vat(vat(VatDirection::Input, dec!(25), 40000, 10000)),
            book.credit("2440", 50000),
        ],
    )
    .await;

    let report = vat_report(&book, date(2024, 1, 1), date(2024, 3, 31)).await.unwrap();

    let output_sum: i64 = report.output_vat.rate_groups.iter().map(|g| g.vat_amount_minor).sum();
    let input_sum: i64 = report.input_vat.rate_groups.iter().map(|g| g.vat_amount_minor).sum();
    assert_eq!(output_sum, report.output_vat.total_minor);
    assert_eq!(input_sum, report.input_vat.total_minor);
    assert_eq!(
        report.net_vat_minor,
        report.output_vat.total_minor - report.input_vat.total_minor
    );

    assert_eq!(report.output_vat.rate_groups.len(), 2);
    let group_25 = report.output_vat.group(dec!(25)).unwrap();
    assert_eq!(group_25.tax_base_minor, 105000);
    assert_eq!(group_25.vat_amount_minor, 26250);
    assert_eq!(group_25.transaction_count, 2);
    assert_eq!(report.output_vat.rate_groups[1].rate, dec!(12));

    assert_eq!(report.net_vat_minor, 27450 - 10000);
    assert!(report.is_payable());

    let declaration = report.declaration().unwrap();
    assert_eq!(declaration.box_05_taxable_sales_minor, 115000);
    assert_eq!(declaration.box_10_output_vat_25_minor, 26250);
    assert_eq!(declaration.box_11_output_vat_12_minor, 1200);
    assert_eq!(declaration.box_48_input_vat_minor, 10000);
    assert_eq!(declaration.box_49_net_vat_minor, 17450);
}

#[tokio::test]
async fn test_drafts_and_voided_entries_do_not_count() {
    let book = TestBook::new().await;
    let fy = book.fiscal_year(2024).await;

    book.draft(
        &fy,
        date(2024, 1, 10),
        "Utkast",
        vec![
            book.debit("1510", 125000),
            book.credit("3011", 100000),
            book.credit("2611", 25000)
                .with_vat(vat(VatDirection::Output, dec!(25), 100000, 25000)),
        ],
    )
    .await;
    let posted = book
        .post(
            &fy,
            date(2024, 1, 11),
            "Faktura",
            vec![
                book.debit("1510", 125000),
                book.credit("3011", 100000),
                book.credit("2611", 25000)
                    .with_vat(vat(VatDirection::Output, dec!(25), 100000, 25000)),
            ],
        )
        .await;
    journal_service::void_entry(&book.store, &book.ctx(), posted.id, "Makulerad")
        .await
        .unwrap();

    let report = vat_report(&book, date(2024, 1, 1), date(2024, 1, 31)).await.unwrap();
    assert!(report.output_vat.rate_groups.is_empty());
    assert_eq!(report.output_vat.total_minor, 0);
    assert_eq!(report.net_vat_minor, 0);
}

#[tokio::test]
async fn test_input_surplus_means_refund() {
    let book = TestBook::new().await;
    let fy = book.fiscal_year(2024).await;

    book.post(
        &fy,
        date(2024, 4, 2),
        "Inköp dator",
        vec![
            book.debit("4010", 2000000),
            book.debit("2641", 500000)
                .with_vat(vat(VatDirection::Input, dec!(25), 2000000, 500000)),
            book.credit("1930", 2500000),
        ],
    )
    .await;

    let report = vat_report(&book, date(2024, 4, 1), date(2024, 6, 30)).await.unwrap();
    assert_eq!(report.net_vat_minor, -500000);
    assert!(!report.is_payable());
    assert_eq!(report.declaration().unwrap().box_49_net_vat_minor, -500000);
}

#[tokio::test]
async fn test_inverted_range_rejected() {
    let book = TestBook::new().await;
    let err = vat_report(&book, date(2024, 3, 31), date(2024, 1, 1)).await.unwrap_err();
    assert!(matches!(err, VatError::InvalidRange { .. }));
}

#[tokio::test]
async fn test_transaction_count_counts_entries_not_lines() {
    let book = TestBook::new().await;
    let fy = book.fiscal_year(2024).await;

    // One invoice with two service rows at 25 %
    book.post(
        &fy,
        date(2024, 5, 6),
        "Faktura 7",
        vec![
            book.debit("1510", 187500),
            book.credit("3011", 150000),
            book.credit("2611", 25000)
                .with_vat(vat(VatDirection::Output, dec!(25), 100000, 25000)),
            book.credit("2611", 12500)
                .with_vat(vat(VatDirection::Output, dec!(25), 50000, 12500)),
        ],
    )
    .await;

    let report = vat_report(&book, date(2024, 5, 1), date(2024, 5, 31)).await.unwrap();
    let group_25 = report.output_vat.group(dec!(25)).unwrap();
    assert_eq!(group_25.tax_base_minor, 150000);
    assert_eq!(group_25.vat_amount_minor, 37500);
    assert_eq!(group_25.transaction_count, 1);
}
