//! Report projection integration tests for billing-service.

mod common;

use chrono::Utc;
use common::{dec, TestApp};
use rust_decimal::Decimal;
use serde_json::Value;

#[tokio::test]
async fn dashboard_counters_reflect_billing_state() {
    let app = TestApp::spawn().await;

    let active = app.create_student("RPT-1001", "6").await;
    let inactive = app.create_student("RPT-1002", "7").await;
    app.put(
        &format!("/students/{}", inactive),
        common::ADMIN_USER_ID,
        &serde_json::json!({ "is_active": false }),
    )
    .await;

    // One open invoice, one overdue, one fully paid.
    app.create_invoice(active, 5000, "2027-04-30").await;
    app.create_invoice(active, 3000, "2020-01-31").await;
    let (paid, _) = app.create_invoice(inactive, 2000, "2027-04-30").await;
    let response = app.record_payment(paid, 2000, "cash").await;
    assert_eq!(response.status(), 201);

    let response = app.get("/reports/dashboard").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    assert_eq!(body["total_students"], 2);
    assert_eq!(body["active_students"], 1);
    assert_eq!(dec(&body["total_collected"]), Decimal::from(2000));
    assert_eq!(body["open_invoices"], 2);
    assert_eq!(body["overdue_invoices"], 1);

    app.cleanup().await;
}

#[tokio::test]
async fn daily_collection_covers_only_the_requested_day() {
    let app = TestApp::spawn().await;
    let student = app.create_student("RPT-1003", "6").await;
    let (invoice_id, _) = app.create_invoice(student, 8000, "2027-04-30").await;

    let response = app.record_payment(invoice_id, 3000, "upi").await;
    assert_eq!(response.status(), 201);
    let response = app.record_payment(invoice_id, 5000, "card").await;
    assert_eq!(response.status(), 201);

    let today = Utc::now().date_naive();
    let response = app
        .get(&format!("/reports/daily-collection?date={}", today))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["payments"].as_array().unwrap().len(), 2);
    assert_eq!(dec(&body["total"]), Decimal::from(8000));

    // A day with no payments reports an empty list and a zero total.
    let response = app
        .get("/reports/daily-collection?date=2019-06-01")
        .await;
    let body: Value = response.json().await.expect("Invalid JSON");
    assert!(body["payments"].as_array().unwrap().is_empty());
    assert_eq!(dec(&body["total"]), Decimal::ZERO);

    app.cleanup().await;
}

#[tokio::test]
async fn pending_fees_annotates_balances() {
    let app = TestApp::spawn().await;
    let student = app.create_student("RPT-1004", "6").await;

    let (partial, _) = app.create_invoice(student, 10000, "2027-04-30").await;
    let response = app.record_payment(partial, 4000, "cash").await;
    assert_eq!(response.status(), 201);

    let (overdue, _) = app.create_invoice(student, 3000, "2020-01-31").await;

    let (settled, _) = app.create_invoice(student, 2000, "2027-04-30").await;
    let response = app.record_payment(settled, 2000, "cash").await;
    assert_eq!(response.status(), 201);

    let response = app.get("/reports/pending-fees").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    let invoices = body["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 2);
    assert_eq!(dec(&body["total_outstanding"]), Decimal::from(9000));

    for row in invoices {
        let id = row["invoice_id"].as_str().unwrap();
        if id == partial.to_string() {
            assert_eq!(dec(&row["balance_due"]), Decimal::from(6000));
            assert_eq!(row["display_status"], "partial");
        } else {
            assert_eq!(id, overdue.to_string());
            assert_eq!(dec(&row["balance_due"]), Decimal::from(3000));
            assert_eq!(row["display_status"], "overdue");
        }
    }

    app.cleanup().await;
}

#[tokio::test]
async fn class_wise_collection_sorts_and_computes_shares() {
    let app = TestApp::spawn().await;

    let class6_student = app.create_student("RPT-1005", "6").await;
    let class8_student = app.create_student("RPT-1006", "8").await;

    let (inv6, _) = app.create_invoice(class6_student, 10000, "2027-04-30").await;
    let (inv8, _) = app.create_invoice(class8_student, 10000, "2027-04-30").await;

    for (invoice, amount) in [(inv6, 1000), (inv6, 3000), (inv8, 2000)] {
        let response = app.record_payment(invoice, amount, "cash").await;
        assert_eq!(response.status(), 201);
    }

    let response = app.get("/reports/class-wise").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    assert_eq!(dec(&body["grand_total"]), Decimal::from(6000));

    let breakdown = body["breakdown"].as_array().unwrap();
    assert_eq!(breakdown.len(), 2);

    assert_eq!(breakdown[0]["class"], "6");
    assert_eq!(dec(&breakdown[0]["total"]), Decimal::from(4000));
    assert_eq!(dec(&breakdown[0]["pct"]), "66.7".parse::<Decimal>().unwrap());

    assert_eq!(breakdown[1]["class"], "8");
    assert_eq!(dec(&breakdown[1]["total"]), Decimal::from(2000));
    assert_eq!(dec(&breakdown[1]["pct"]), "33.3".parse::<Decimal>().unwrap());

    app.cleanup().await;
}

#[tokio::test]
async fn class_wise_collection_handles_no_payments() {
    let app = TestApp::spawn().await;

    let response = app.get("/reports/class-wise").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    assert!(body["breakdown"].as_array().unwrap().is_empty());
    assert_eq!(dec(&body["grand_total"]), Decimal::ZERO);

    app.cleanup().await;
}

#[tokio::test]
async fn payment_mode_breakdown_groups_by_method() {
    let app = TestApp::spawn().await;
    let student = app.create_student("RPT-1007", "6").await;
    let (invoice_id, _) = app.create_invoice(student, 10000, "2027-04-30").await;

    for (amount, method) in [(2000, "upi"), (3000, "upi"), (1000, "cash")] {
        let response = app.record_payment(invoice_id, amount, method).await;
        assert_eq!(response.status(), 201);
    }

    let response = app.get("/reports/payment-modes").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    assert_eq!(dec(&body["grand_total"]), Decimal::from(6000));
    let breakdown = body["breakdown"].as_array().unwrap();
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0]["payment_method"], "upi");
    assert_eq!(breakdown[0]["count"], 2);
    assert_eq!(dec(&breakdown[0]["total"]), Decimal::from(5000));

    app.cleanup().await;
}

#[tokio::test]
async fn student_ledger_interleaves_invoices_and_payments() {
    let app = TestApp::spawn().await;
    let student = app.create_student("RPT-1008", "6").await;

    let (invoice_id, _) = app.create_invoice(student, 10000, "2027-04-30").await;
    let response = app.record_payment(invoice_id, 4000, "cash").await;
    assert_eq!(response.status(), 201);

    let response = app
        .get(&format!("/reports/student-ledger/{}", student))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    assert_eq!(dec(&body["total_billed"]), Decimal::from(10000));
    assert_eq!(dec(&body["total_paid"]), Decimal::from(4000));
    assert_eq!(dec(&body["outstanding"]), Decimal::from(6000));

    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["entry_type"], "invoice");
    assert_eq!(dec(&entries[0]["balance"]), Decimal::from(10000));
    assert_eq!(entries[1]["entry_type"], "payment");
    assert_eq!(dec(&entries[1]["balance"]), Decimal::from(6000));

    app.cleanup().await;
}

#[tokio::test]
async fn reports_are_idempotent_between_writes() {
    let app = TestApp::spawn().await;
    let student = app.create_student("RPT-1009", "6").await;
    let (invoice_id, _) = app.create_invoice(student, 7000, "2027-04-30").await;
    let response = app.record_payment(invoice_id, 2500, "upi").await;
    assert_eq!(response.status(), 201);

    let first: Value = app
        .get("/reports/dashboard")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    let second: Value = app
        .get("/reports/dashboard")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(first, second);

    let first: Value = app
        .get("/reports/pending-fees")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    let second: Value = app
        .get("/reports/pending-fees")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(first, second);

    let first: Value = app
        .get("/reports/class-wise")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    let second: Value = app
        .get("/reports/class-wise")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(first, second);

    app.cleanup().await;
}
