use serde_json::{Value, json};

use crate::common::{ERP_POINTS, TestApp, TestStudent, routes};

fn profile_body() -> Value {
    json!({
        "phone": "+91 98765 43210",
        "guardian_name": "R. Kumar",
        "annual_family_income": 450000,
        "semesters": [
            {"semester": 2, "sgpa": 9.0, "credits": 30},
            {"semester": 1, "sgpa": 8.0, "credits": 20},
        ],
    })
}

async fn submitted_profile(app: &TestApp) -> TestStudent {
    let student = app.create_student("21CS001").await;
    let res = app
        .put_with_token(routes::ERP_ME, &profile_body(), &student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    let res = app
        .post_with_token(routes::ERP_SUBMIT, &json!({}), &student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    student
}

#[tokio::test]
async fn profile_does_not_exist_until_saved() {
    let app = TestApp::spawn().await;
    let student = app.create_student("21CS001").await;

    let res = app.get_with_token(routes::ERP_ME, &student.token).await;

    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn saved_profile_is_a_draft_with_derived_cgpa() {
    let app = TestApp::spawn().await;
    let student = app.create_student("21CS001").await;

    let res = app
        .put_with_token(routes::ERP_ME, &profile_body(), &student.token)
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["status"], "draft");
    assert_eq!(res.body["cgpa"], 8.6);
    assert_eq!(res.body["semesters"][0]["semester"], 1);
}

#[tokio::test]
async fn duplicate_semesters_are_rejected() {
    let app = TestApp::spawn().await;
    let student = app.create_student("21CS001").await;

    let res = app
        .put_with_token(
            routes::ERP_ME,
            &json!({"semesters": [
                {"semester": 1, "sgpa": 8.0, "credits": 20},
                {"semester": 1, "sgpa": 9.0, "credits": 20},
            ]}),
            &student.token,
        )
        .await;

    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn submitting_twice_conflicts() {
    let app = TestApp::spawn().await;
    let student = submitted_profile(&app).await;

    let res = app
        .post_with_token(routes::ERP_SUBMIT, &json!({}), &student.token)
        .await;

    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn verification_awards_points_exactly_once() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let student = submitted_profile(&app).await;

    let res = app
        .post_with_token(
            &routes::erp_verify(student.id),
            &json!({"remarks": "Marksheets checked"}),
            &admin,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["profile"]["status"], "verified");
    assert_eq!(res.body["profile"]["points_awarded"], ERP_POINTS);
    assert_eq!(res.body["student_total_points"], ERP_POINTS);

    let again = app
        .post_with_token(&routes::erp_verify(student.id), &json!({}), &admin)
        .await;
    assert_eq!(again.status, 409);
    assert_eq!(app.total_points(student.id, &admin).await, ERP_POINTS as i64);

    let detail = app.get_with_token(&routes::student(student.id), &admin).await;
    assert_eq!(detail.body["student"]["erp_points"], ERP_POINTS);

    let reconcile = app
        .post_with_token(&routes::reconcile(student.id), &json!({}), &admin)
        .await;
    assert_eq!(reconcile.body["drift"], 0);
}

#[tokio::test]
async fn verified_profile_is_read_only() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let student = submitted_profile(&app).await;
    app.post_with_token(&routes::erp_verify(student.id), &json!({}), &admin)
        .await;

    let res = app
        .put_with_token(routes::ERP_ME, &profile_body(), &student.token)
        .await;

    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn rejected_profile_can_be_fixed_and_resubmitted() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let student = submitted_profile(&app).await;

    let res = app
        .post_with_token(
            &routes::erp_reject(student.id),
            &json!({"remarks": "Semester 2 marksheet missing"}),
            &admin,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["status"], "rejected");
    assert_eq!(app.total_points(student.id, &admin).await, 0);

    let res = app
        .put_with_token(routes::ERP_ME, &profile_body(), &student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    let res = app
        .post_with_token(routes::ERP_SUBMIT, &json!({}), &student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["status"], "submitted");
}

#[tokio::test]
async fn admin_list_filters_by_status() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    submitted_profile(&app).await;
    let drafter = app.create_student("21CS002").await;
    app.put_with_token(routes::ERP_ME, &profile_body(), &drafter.token)
        .await;

    let res = app
        .get_with_token(&format!("{}?status=submitted", routes::ERP_ADMIN), &admin)
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["pagination"]["total"], 1);
    assert_eq!(res.body["data"][0]["status"], "submitted");
}

#[tokio::test]
async fn verifying_a_draft_conflicts() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let student = app.create_student("21CS001").await;
    app.put_with_token(routes::ERP_ME, &profile_body(), &student.token)
        .await;

    let res = app
        .post_with_token(&routes::erp_verify(student.id), &json!({}), &admin)
        .await;

    assert_eq!(res.status, 409);
    assert_eq!(app.total_points(student.id, &admin).await, 0);
}

#[tokio::test]
async fn students_cannot_review_profiles() {
    let app = TestApp::spawn().await;
    let student = submitted_profile(&app).await;

    let verify = app
        .post_with_token(&routes::erp_verify(student.id), &json!({}), &student.token)
        .await;
    let list = app.get_with_token(routes::ERP_ADMIN, &student.token).await;

    assert_eq!(verify.status, 403);
    assert_eq!(list.status, 403);
}
