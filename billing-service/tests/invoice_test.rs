//! Invoice lifecycle integration tests for billing-service.

mod common;

use common::{dec, TestApp, ACCOUNTANT_USER_ID, ADMIN_USER_ID};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn create_invoice_fixes_amount_from_items() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1001", "6").await;

    let response = app
        .post(
            "/invoices",
            ACCOUNTANT_USER_ID,
            &json!({
                "student_id": student_id,
                "due_date": "2027-04-30",
                "description": "Q1 Fee 2026-27",
                "items": [
                    { "description": "Tuition Fee", "amount": 12000 },
                    { "description": "Transport Fee", "amount": 3000 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");

    let invoice = &body["invoice"];
    assert!(invoice["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));
    assert_eq!(invoice["status"], "pending");
    assert_eq!(dec(&invoice["amount"]), Decimal::from(15000));
    assert_eq!(dec(&invoice["paid_amount"]), Decimal::ZERO);
    assert_eq!(dec(&invoice["balance_due"]), Decimal::from(15000));
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["student"]["first_name"], "Asha");

    app.cleanup().await;
}

#[tokio::test]
async fn create_invoice_without_items_is_rejected() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1002", "6").await;

    let response = app
        .post(
            "/invoices",
            ACCOUNTANT_USER_ID,
            &json!({
                "student_id": student_id,
                "due_date": "2027-04-30",
                "items": []
            }),
        )
        .await;

    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
async fn create_invoice_with_non_positive_item_is_rejected() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1003", "6").await;

    for bad_amount in [-500, 0] {
        let response = app
            .post(
                "/invoices",
                ACCOUNTANT_USER_ID,
                &json!({
                    "student_id": student_id,
                    "due_date": "2027-04-30",
                    "items": [{ "description": "Tuition", "amount": bad_amount }]
                }),
            )
            .await;

        assert_eq!(response.status(), 400);
    }

    app.cleanup().await;
}

#[tokio::test]
async fn create_invoice_for_unknown_student_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/invoices",
            ACCOUNTANT_USER_ID,
            &json!({
                "student_id": "99999999-9999-9999-9999-999999999999",
                "due_date": "2027-04-30",
                "items": [{ "description": "Tuition", "amount": 1000 }]
            }),
        )
        .await;

    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn invoice_numbers_are_unique_and_sequential_in_format() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1004", "7").await;

    let (_, first) = app.create_invoice(student_id, 1000, "2027-04-30").await;
    let (_, second) = app.create_invoice(student_id, 2000, "2027-04-30").await;

    let first_number = first["invoice"]["invoice_number"].as_str().unwrap();
    let second_number = second["invoice"]["invoice_number"].as_str().unwrap();
    assert_ne!(first_number, second_number);
    assert!(first_number.starts_with("INV-"));
    assert!(second_number.starts_with("INV-"));

    app.cleanup().await;
}

#[tokio::test]
async fn past_due_invoice_displays_overdue_without_mutating_status() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1005", "8").await;

    let (invoice_id, _) = app.create_invoice(student_id, 5000, "2020-01-31").await;

    let response = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");

    assert_eq!(body["invoice"]["status"], "pending");
    assert_eq!(body["invoice"]["display_status"], "overdue");

    app.cleanup().await;
}

#[tokio::test]
async fn list_invoices_filters_by_status_and_student() {
    let app = TestApp::spawn().await;
    let first_student = app.create_student("ADM-1006", "6").await;
    let second_student = app.create_student("ADM-1007", "7").await;

    let (paid_invoice, _) = app.create_invoice(first_student, 1000, "2027-04-30").await;
    app.create_invoice(second_student, 2000, "2027-04-30").await;

    let response = app.record_payment(paid_invoice, 1000, "cash").await;
    assert_eq!(response.status(), 201);

    let response = app.get("/invoices?status=paid").await;
    let body: Value = response.json().await.expect("Invalid JSON");
    let invoices = body["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(
        invoices[0]["invoice_id"].as_str().unwrap(),
        paid_invoice.to_string()
    );

    let response = app
        .get(&format!("/invoices?student_id={}", second_student))
        .await;
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["invoices"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn cancel_is_limited_to_unpaid_invoices() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1008", "6").await;

    let (unpaid, _) = app.create_invoice(student_id, 3000, "2027-04-30").await;
    let response = app
        .post(
            &format!("/invoices/{}/cancel", unpaid),
            ACCOUNTANT_USER_ID,
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["status"], "cancelled");

    // A cancelled invoice no longer accepts payments.
    let response = app.record_payment(unpaid, 1000, "cash").await;
    assert_eq!(response.status(), 400);

    // An invoice with a recorded payment cannot be cancelled.
    let (partly_paid, _) = app.create_invoice(student_id, 3000, "2027-04-30").await;
    let response = app.record_payment(partly_paid, 1000, "cash").await;
    assert_eq!(response.status(), 201);
    let response = app
        .post(
            &format!("/invoices/{}/cancel", partly_paid),
            ACCOUNTANT_USER_ID,
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn deleting_a_student_cascades_to_invoices() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("ADM-1009", "6").await;
    let (invoice_id, _) = app.create_invoice(student_id, 1000, "2027-04-30").await;

    let response = app
        .delete(&format!("/students/{}", student_id), ADMIN_USER_ID)
        .await;
    assert_eq!(response.status(), 204);

    let response = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
