//! Fee structure and discount integration tests for billing-service.

mod common;

use common::{dec, TestApp, ACCOUNTANT_USER_ID, ADMIN_USER_ID};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn create_fee_structure_with_components() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            ADMIN_USER_ID,
            &json!({
                "name": "Primary Wing 2026-27",
                "classes": ["1", "2", "3", "4", "5"],
                "components": [
                    { "name": "Tuition Fee", "amount": 4500, "frequency": "monthly" },
                    { "name": "Lab Fee", "amount": 1200, "frequency": "quarterly" },
                    { "name": "Annual Day Charges", "amount": 800, "frequency": "annual" }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["fee_structure"]["name"], "Primary Wing 2026-27");
    assert_eq!(body["fee_structure"]["classes"].as_array().unwrap().len(), 5);

    let components = body["components"].as_array().unwrap();
    assert_eq!(components.len(), 3);
    assert_eq!(components[0]["name"], "Tuition Fee");
    assert_eq!(components[0]["frequency"], "monthly");
    assert_eq!(dec(&components[0]["amount"]), Decimal::from(4500));

    app.cleanup().await;
}

#[tokio::test]
async fn fee_structure_requires_components_with_positive_amounts() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            ADMIN_USER_ID,
            &json!({
                "name": "Empty",
                "classes": ["1"],
                "components": []
            }),
        )
        .await;
    assert_eq!(response.status(), 422);

    let response = app
        .post(
            "/fee-structures",
            ADMIN_USER_ID,
            &json!({
                "name": "Negative",
                "classes": ["1"],
                "components": [{ "name": "Tuition", "amount": -100, "frequency": "monthly" }]
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn updating_components_replaces_the_list() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            ADMIN_USER_ID,
            &json!({
                "name": "Middle Wing",
                "classes": ["6", "7", "8"],
                "components": [
                    { "name": "Tuition Fee", "amount": 6000, "frequency": "monthly" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");
    let id = body["fee_structure"]["fee_structure_id"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/fee-structures/{}", id),
            ACCOUNTANT_USER_ID,
            &json!({
                "components": [
                    { "name": "Tuition Fee", "amount": 6500, "frequency": "monthly" },
                    { "name": "Sports Fee", "amount": 900, "frequency": "annual" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    let components = body["components"].as_array().unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(dec(&components[0]["amount"]), Decimal::from(6500));

    app.cleanup().await;
}

#[tokio::test]
async fn fee_structure_delete_and_missing_reads() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/fee-structures",
            ADMIN_USER_ID,
            &json!({
                "name": "Transient",
                "classes": ["9"],
                "components": [{ "name": "Tuition", "amount": 100, "frequency": "monthly" }]
            }),
        )
        .await;
    let body: Value = response.json().await.expect("Invalid JSON");
    let id = body["fee_structure"]["fee_structure_id"].as_str().unwrap().to_string();

    let response = app
        .delete(&format!("/fee-structures/{}", id), ADMIN_USER_ID)
        .await;
    assert_eq!(response.status(), 204);

    let response = app.get(&format!("/fee-structures/{}", id)).await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn discounts_are_catalogued_but_never_change_invoice_totals() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/discounts",
            ADMIN_USER_ID,
            &json!({
                "name": "Sibling Discount",
                "discount_type": "percentage",
                "value": 10,
                "applicability": "Second child onwards"
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");
    let discount_id = body["discount_id"].as_str().unwrap().to_string();
    assert_eq!(body["is_active"], true);

    // An invoice that names the discount keeps its full item total.
    let student_id = app.create_student("FEE-3001", "6").await;
    let response = app
        .post(
            "/invoices",
            ACCOUNTANT_USER_ID,
            &json!({
                "student_id": student_id,
                "due_date": "2027-04-30",
                "items": [{ "description": "Tuition Fee", "amount": 10000 }],
                "discount_ids": [discount_id]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(dec(&body["invoice"]["amount"]), Decimal::from(10000));

    app.cleanup().await;
}

#[tokio::test]
async fn discount_toggle_and_filtering() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/discounts",
            ADMIN_USER_ID,
            &json!({
                "name": "Staff Ward Concession",
                "discount_type": "fixed",
                "value": 2500
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");
    let discount_id = body["discount_id"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/discounts/{}", discount_id),
            ADMIN_USER_ID,
            &json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app.get("/discounts?active_only=true").await;
    let body: Value = response.json().await.expect("Invalid JSON");
    assert!(body.as_array().unwrap().is_empty());

    let response = app.get("/discounts").await;
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body.as_array().unwrap().len(), 1);

    app.cleanup().await;
}
