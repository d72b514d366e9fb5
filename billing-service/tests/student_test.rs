//! Student administration integration tests for billing-service.

mod common;

use common::{TestApp, ADMIN_USER_ID};
use serde_json::{json, Value};

#[tokio::test]
async fn enroll_and_fetch_student() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/students",
            ADMIN_USER_ID,
            &json!({
                "admission_number": "STU-2001",
                "first_name": "Meera",
                "last_name": "Iyer",
                "class": "10",
                "section": "C",
                "date_of_birth": "2010-06-14",
                "parent_name": "Lakshmi Iyer",
                "parent_phone": "+91 98111 22334",
                "parent_email": "lakshmi.iyer@example.com"
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["is_active"], true);

    let student_id = body["student_id"].as_str().unwrap();
    let response = app.get(&format!("/students/{}", student_id)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["admission_number"], "STU-2001");
    assert_eq!(body["class"], "10");

    app.cleanup().await;
}

#[tokio::test]
async fn duplicate_admission_numbers_conflict() {
    let app = TestApp::spawn().await;
    app.create_student("STU-2002", "6").await;

    let response = app
        .post(
            "/students",
            ADMIN_USER_ID,
            &json!({
                "admission_number": "STU-2002",
                "first_name": "Other",
                "last_name": "Student",
                "class": "6",
                "section": "A",
                "parent_name": "Parent",
                "parent_phone": "+91 90000 00001"
            }),
        )
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn blank_required_fields_fail_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/students",
            ADMIN_USER_ID,
            &json!({
                "admission_number": "",
                "first_name": "Meera",
                "last_name": "Iyer",
                "class": "10",
                "section": "C",
                "parent_name": "Lakshmi Iyer",
                "parent_phone": "+91 98111 22334"
            }),
        )
        .await;
    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
async fn deactivation_is_an_update_not_a_delete() {
    let app = TestApp::spawn().await;
    let student_id = app.create_student("STU-2003", "6").await;

    let response = app
        .put(
            &format!("/students/{}", student_id),
            ADMIN_USER_ID,
            &json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["is_active"], false);

    // Still fetchable; just excluded from active-only listings.
    let response = app.get(&format!("/students/{}", student_id)).await;
    assert_eq!(response.status(), 200);

    let response = app.get("/students?active_only=true").await;
    let body: Value = response.json().await.expect("Invalid JSON");
    assert!(body["students"].as_array().unwrap().is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn listing_filters_by_class_and_search() {
    let app = TestApp::spawn().await;
    app.create_student("STU-2004", "6").await;
    app.create_student("STU-2005", "7").await;

    let response = app.get("/students?class=7").await;
    let body: Value = response.json().await.expect("Invalid JSON");
    let students = body["students"].as_array().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["admission_number"], "STU-2005");

    let response = app.get("/students?search=stu-2004").await;
    let body: Value = response.json().await.expect("Invalid JSON");
    let students = body["students"].as_array().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["admission_number"], "STU-2004");

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_student_reads_are_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/students/99999999-9999-9999-9999-999999999999")
        .await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
