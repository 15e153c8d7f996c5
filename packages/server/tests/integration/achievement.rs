use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::common::{TestApp, routes};

/// Wait for the background mail task to deliver `count` emails.
async fn wait_for_mail(app: &TestApp, count: usize) -> Vec<erp_server::services::mail::Email> {
    for _ in 0..50 {
        {
            let sent = app.mailer.sent.lock().unwrap();
            if sent.len() >= count {
                return sent.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    app.mailer.sent.lock().unwrap().clone()
}

mod submission {
    use super::*;

    #[tokio::test]
    async fn student_submission_starts_pending_with_zero_points() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let id = app.submit_achievement(&student.token, json!({})).await;
        let res = app
            .get_with_token(&routes::achievement(id), &student.token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "pending");
        assert_eq!(res.body["points"], 0);
        assert_eq!(res.body["student_id"], student.id);
    }

    #[tokio::test]
    async fn suspicious_verdict_is_visible_to_admins_only() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let own = app
            .get_with_token(&routes::achievement(id), &student.token)
            .await;
        assert!(own.body["suspicious_activity"].is_null());

        let reviewed = app.get_with_token(&routes::achievement(id), &admin).await;
        assert!(reviewed.body["suspicious_activity"]["risk_score"].is_number());
        assert!(reviewed.body["suspicious_activity"]["patterns"].is_array());
    }

    #[tokio::test]
    async fn proof_file_must_have_been_uploaded() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .post_with_token(
                routes::ACHIEVEMENTS,
                &json!({
                    "title": "Smart India Hackathon",
                    "achievement_type": "Competition",
                    "category": "Competition",
                    "level": "National",
                    "proof_files": ["/uploads/never-uploaded.png"],
                }),
                &student.token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn at_least_one_proof_file_is_required() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .post_with_token(
                routes::ACHIEVEMENTS,
                &json!({
                    "title": "Smart India Hackathon",
                    "achievement_type": "Competition",
                    "category": "Competition",
                    "level": "National",
                    "proof_files": [],
                }),
                &student.token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn admins_cannot_submit_achievements() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .post_with_token(
                routes::ACHIEVEMENTS,
                &json!({
                    "title": "Smart India Hackathon",
                    "achievement_type": "Competition",
                    "category": "Competition",
                    "level": "National",
                    "proof_files": ["/uploads/x.png"],
                }),
                &admin,
            )
            .await;

        assert_eq!(res.status, 403);
    }
}

mod visibility {
    use super::*;

    #[tokio::test]
    async fn students_only_list_their_own_achievements() {
        let app = TestApp::spawn().await;
        let asha = app.create_student("21CS001").await;
        let ravi = app.create_student("21CS002").await;
        let admin = app.admin_token().await;

        app.submit_achievement(&asha.token, json!({})).await;
        app.submit_achievement(&ravi.token, json!({"title": "ICPC Regional"}))
            .await;

        let own = app.get_with_token(routes::ACHIEVEMENTS, &asha.token).await;
        assert_eq!(own.status, 200, "{}", own.text);
        assert_eq!(own.body["pagination"]["total"], 1);
        assert_eq!(own.body["data"][0]["student_id"], asha.id);

        let all = app.get_with_token(routes::ACHIEVEMENTS, &admin).await;
        assert_eq!(all.body["pagination"]["total"], 2);

        let filtered = app
            .get_with_token(
                &format!("{}?student_id={}", routes::ACHIEVEMENTS, ravi.id),
                &admin,
            )
            .await;
        assert_eq!(filtered.body["pagination"]["total"], 1);
        assert_eq!(filtered.body["data"][0]["title"], "ICPC Regional");
    }

    #[tokio::test]
    async fn another_students_achievement_is_forbidden() {
        let app = TestApp::spawn().await;
        let asha = app.create_student("21CS001").await;
        let ravi = app.create_student("21CS002").await;
        let id = app.submit_achievement(&asha.token, json!({})).await;

        let res = app.get_with_token(&routes::achievement(id), &ravi.token).await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn title_search_is_case_insensitive() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        app.submit_achievement(&student.token, json!({"title": "Smart India Hackathon"}))
            .await;
        app.submit_achievement(
            &student.token,
            json!({"title": "AWS Certified Cloud Practitioner", "achievement_type": "Certification"}),
        )
        .await;

        let res = app
            .get_with_token(&format!("{}?search=HACKATHON", routes::ACHIEVEMENTS), &admin)
            .await;

        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["title"], "Smart India Hackathon");
    }
}

mod review {
    use super::*;

    #[tokio::test]
    async fn national_first_place_competition_awards_200_points() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .post_with_token(&routes::approve(id), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["achievement"]["status"], "approved");
        assert_eq!(res.body["achievement"]["points"], 200);
        assert_eq!(res.body["student_total_points"], 200);
        assert_eq!(app.total_points(student.id, &admin).await, 200);

        let mail = wait_for_mail(&app, 1).await;
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].to, student.email);
        assert!(mail[0].subject.contains("approved"));
    }

    #[tokio::test]
    async fn custom_points_override_the_calculation() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .post_with_token(&routes::approve(id), &json!({"custom_points": 35}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["achievement"]["points"], 35);
        assert_eq!(app.total_points(student.id, &admin).await, 35);
    }

    #[tokio::test]
    async fn negative_custom_points_are_rejected() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .post_with_token(&routes::approve(id), &json!({"custom_points": -5}), &admin)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.total_points(student.id, &admin).await, 0);
    }

    #[tokio::test]
    async fn oversized_custom_points_are_rejected() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .post_with_token(
                &routes::approve(id),
                &json!({"custom_points": i32::MAX}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.total_points(student.id, &admin).await, 0);
    }

    #[tokio::test]
    async fn approval_that_would_overflow_the_total_is_refused() {
        use erp_server::entity::student;
        use sea_orm::sea_query::Expr;
        use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;
        student::Entity::update_many()
            .col_expr(student::Column::TotalPoints, Expr::value(i32::MAX - 100))
            .filter(student::Column::Id.eq(student.id))
            .exec(&app.db)
            .await
            .unwrap();

        let res = app
            .post_with_token(&routes::approve(id), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(
            app.total_points(student.id, &admin).await,
            i64::from(i32::MAX - 100)
        );
        let detail = app.get_with_token(&routes::achievement(id), &admin).await;
        assert_eq!(detail.body["status"], "pending");
        assert_eq!(detail.body["points"], 0);
    }

    #[tokio::test]
    async fn approving_twice_conflicts_and_leaves_totals_unchanged() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let first = app
            .post_with_token(&routes::approve(id), &json!({}), &admin)
            .await;
        assert_eq!(first.status, 200, "{}", first.text);

        let second = app
            .post_with_token(&routes::approve(id), &json!({"custom_points": 500}), &admin)
            .await;

        assert_eq!(second.status, 409);
        assert_eq!(second.body["code"], "CONFLICT");
        assert_eq!(app.total_points(student.id, &admin).await, 200);
    }

    #[tokio::test]
    async fn rejection_never_touches_points() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let approved = app.submit_achievement(&student.token, json!({})).await;
        let pending = app
            .submit_achievement(&student.token, json!({"title": "ICPC Regional"}))
            .await;
        app.post_with_token(&routes::approve(approved), &json!({}), &admin)
            .await;

        let res = app
            .post_with_token(
                &routes::reject(pending),
                &json!({"reason": "Certificate is not legible"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["achievement"]["status"], "rejected");
        assert_eq!(res.body["achievement"]["points"], 0);
        assert_eq!(
            res.body["achievement"]["rejection_reason"],
            "Certificate is not legible"
        );
        assert_eq!(res.body["student_total_points"], 200);

        // Rejecting an already approved achievement is a conflict, not a deduction.
        let res = app
            .post_with_token(&routes::reject(approved), &json!({}), &admin)
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(app.total_points(student.id, &admin).await, 200);
    }

    #[tokio::test]
    async fn students_cannot_review() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .post_with_token(&routes::approve(id), &json!({}), &student.token)
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn reviewing_a_missing_achievement_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .post_with_token(&routes::approve(9999), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn student_can_delete_own_pending_achievement() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .delete_with_token(&routes::achievement(id), &student.token)
            .await;
        assert_eq!(res.status, 204);

        let res = app
            .get_with_token(&routes::achievement(id), &student.token)
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn student_cannot_delete_a_reviewed_achievement() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app.submit_achievement(&student.token, json!({})).await;
        app.post_with_token(&routes::approve(id), &json!({}), &admin)
            .await;

        let res = app
            .delete_with_token(&routes::achievement(id), &student.token)
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(app.total_points(student.id, &admin).await, 200);
    }

    #[tokio::test]
    async fn admin_deleting_an_approved_achievement_reverses_its_points() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let kept = app
            .submit_achievement(
                &student.token,
                json!({"title": "AWS Certified Cloud Practitioner", "achievement_type": "Certification", "award": null}),
            )
            .await;
        let removed = app.submit_achievement(&student.token, json!({})).await;
        app.post_with_token(&routes::approve(kept), &json!({}), &admin)
            .await;
        app.post_with_token(&routes::approve(removed), &json!({}), &admin)
            .await;
        assert_eq!(app.total_points(student.id, &admin).await, 300);

        let res = app
            .delete_with_token(&routes::achievement(removed), &admin)
            .await;

        assert_eq!(res.status, 204);
        assert_eq!(app.total_points(student.id, &admin).await, 100);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn validation_blends_model_scores_with_local_checks() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let id = app
            .submit_achievement(
                &student.token,
                json!({
                    "title": "AWS Certified Cloud Practitioner",
                    "achievement_type": "Certification",
                    "category": "Certification",
                    "level": "International",
                    "award": null,
                    "issuer": "Amazon Web Services",
                    "achievement_date": "2024-03-01",
                }),
            )
            .await;

        let res = app.post_with_token(&routes::validate(id), &json!({}), &admin).await;

        assert_eq!(res.status, 200, "{}", res.text);
        // 90*.30 + 80*.25 + 85*.20 + 75*.15 + 100*.10
        assert_eq!(res.body["trust_score"], 85);
        assert_eq!(res.body["is_valid"], true);
        assert_eq!(res.body["checks"]["issuer"]["passed"], true);
        assert_eq!(res.body["red_flags"], json!([]));

        let stored = app.get_with_token(&routes::achievement(id), &admin).await;
        assert_eq!(stored.body["validation"]["trust_score"], 85);
    }

    #[tokio::test]
    async fn future_dates_fail_the_date_check() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let admin = app.admin_token().await;
        let tomorrow = (Utc::now().date_naive() + chrono::Days::new(1)).to_string();
        let id = app
            .submit_achievement(&student.token, json!({"achievement_date": tomorrow}))
            .await;

        let res = app.post_with_token(&routes::validate(id), &json!({}), &admin).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["checks"]["date"]["passed"], false);
        assert_eq!(
            res.body["checks"]["date"]["issues"][0],
            "Achievement date is in the future"
        );
    }

    #[tokio::test]
    async fn students_cannot_validate() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .post_with_token(&routes::validate(id), &json!({}), &student.token)
            .await;

        assert_eq!(res.status, 403);
    }
}

mod uploads {
    use super::*;

    #[tokio::test]
    async fn uploaded_proof_can_be_downloaded() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let path = app.upload_proof(&student.token).await;
        let filename = path.trim_start_matches("/uploads/");
        let res = app.get_with_token(&routes::upload(filename), &student.token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.bytes, crate::common::PNG_BYTES);
    }

    #[tokio::test]
    async fn unsupported_file_types_are_rejected() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .upload_with_token("payload.exe", vec![1, 2, 3], "application/octet-stream", &student.token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_upload_is_not_found() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .get_with_token(&routes::upload("nope.png"), &student.token)
            .await;

        assert_eq!(res.status, 404);
    }
}
