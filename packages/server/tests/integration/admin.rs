use std::io::Cursor;

use erp_server::entity::student;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use crate::common::{TestApp, routes};

mod students {
    use super::*;

    #[tokio::test]
    async fn search_matches_name_email_and_roll_number() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        app.create_student("21CS001").await;
        app.create_student("21ME042").await;

        let res = app
            .get_with_token(&format!("{}?search=me042", routes::STUDENTS), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["roll_number"], "21ME042");
    }

    #[tokio::test]
    async fn unknown_sort_field_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .get_with_token(&format!("{}?sort_by=password", routes::STUDENTS), &admin)
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn detail_summarizes_achievements() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;
        let approved = app.submit_achievement(&student.token, json!({})).await;
        app.submit_achievement(&student.token, json!({"title": "ICPC Regional"}))
            .await;
        app.post_with_token(&routes::approve(approved), &json!({}), &admin)
            .await;

        let res = app.get_with_token(&routes::student(student.id), &admin).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["summary"]["total"], 2);
        assert_eq!(res.body["summary"]["approved"], 1);
        assert_eq!(res.body["summary"]["pending"], 1);
        assert_eq!(res.body["summary"]["approved_points"], 200);
        assert_eq!(res.body["recent_achievements"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_student_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app.get_with_token(&routes::student(4242), &admin).await;

        assert_eq!(res.status, 404);
    }
}

mod points {
    use super::*;

    #[tokio::test]
    async fn manual_deduction_is_floored_at_zero() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;

        let added = app
            .post_with_token(
                &routes::adjust_points(student.id),
                &json!({"delta": 30, "reason": "Volunteering"}),
                &admin,
            )
            .await;
        assert_eq!(added.status, 200, "{}", added.text);
        assert_eq!(added.body["applied"], 30);

        let res = app
            .post_with_token(
                &routes::adjust_points(student.id),
                &json!({"delta": -100}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["applied"], -30);
        assert_eq!(res.body["total_points"], 0);
        assert_eq!(app.total_points(student.id, &admin).await, 0);
    }

    #[tokio::test]
    async fn zero_delta_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .post_with_token(&routes::adjust_points(student.id), &json!({"delta": 0}), &admin)
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn adjusting_a_missing_student_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .post_with_token(&routes::adjust_points(4242), &json!({"delta": 10}), &admin)
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn reconcile_reports_no_drift_after_normal_operations() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;
        let id = app.submit_achievement(&student.token, json!({})).await;
        app.post_with_token(&routes::approve(id), &json!({}), &admin)
            .await;
        app.post_with_token(
            &routes::adjust_points(student.id),
            &json!({"delta": -20}),
            &admin,
        )
        .await;

        let res = app
            .post_with_token(&routes::reconcile(student.id), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["drift"], 0);
        assert_eq!(res.body["total_points"], 180);
    }

    #[tokio::test]
    async fn reconcile_repairs_a_drifted_total() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;
        let id = app.submit_achievement(&student.token, json!({})).await;
        app.post_with_token(&routes::approve(id), &json!({}), &admin)
            .await;

        student::Entity::update_many()
            .col_expr(student::Column::TotalPoints, Expr::value(999))
            .filter(student::Column::Id.eq(student.id))
            .exec(&app.db)
            .await
            .unwrap();

        let res = app
            .post_with_token(&routes::reconcile(student.id), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["previous_total"], 999);
        assert_eq!(res.body["total_points"], 200);
        assert_eq!(res.body["drift"], -799);
        assert_eq!(app.total_points(student.id, &admin).await, 200);
    }
}

mod stats {
    use super::*;

    #[tokio::test]
    async fn stats_count_students_achievements_and_points() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let asha = app.create_student("21CS001").await;
        let ravi = app.create_student("21CS002").await;
        let a = app.submit_achievement(&asha.token, json!({})).await;
        let b = app
            .submit_achievement(&ravi.token, json!({"title": "ICPC Regional", "level": "State"}))
            .await;
        app.submit_achievement(&ravi.token, json!({"title": "Code Sprint"}))
            .await;
        app.post_with_token(&routes::approve(a), &json!({}), &admin)
            .await;
        app.post_with_token(&routes::reject(b), &json!({}), &admin)
            .await;

        let res = app.get_with_token(routes::STATS, &admin).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total_students"], 2);
        assert_eq!(res.body["total_achievements"], 3);
        assert_eq!(res.body["achievements_by_status"]["approved"], 1);
        assert_eq!(res.body["achievements_by_status"]["rejected"], 1);
        assert_eq!(res.body["achievements_by_status"]["pending"], 1);
        assert_eq!(res.body["total_points_awarded"], 200);

        let levels = res.body["achievements_by_level"].as_array().unwrap();
        assert_eq!(levels.len(), 6);
        let national = levels.iter().find(|l| l["level"] == "National").unwrap();
        assert_eq!(national["count"], 2);
    }
}

mod export {
    use super::*;

    #[tokio::test]
    async fn achievements_csv_includes_student_columns() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;
        app.submit_achievement(&student.token, json!({})).await;

        let res = app.get_with_token(routes::EXPORT_ACHIEVEMENTS, &admin).await;

        assert_eq!(res.status, 200);
        let mut lines = res.text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,student_name,roll_number"));
        let row = lines.next().unwrap();
        assert!(row.contains("21CS001"));
        assert!(row.contains("Smart India Hackathon"));
        assert!(lines.next().is_none());
    }

    #[tokio::test]
    async fn achievements_csv_filters_by_status() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;
        app.submit_achievement(&student.token, json!({})).await;

        let res = app
            .get_with_token(
                &format!("{}?status=approved", routes::EXPORT_ACHIEVEMENTS),
                &admin,
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.text.lines().count(), 0);
    }

    #[tokio::test]
    async fn students_csv_lists_every_student() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        app.create_student("21CS001").await;
        app.create_student("21CS002").await;

        let res = app.get_with_token(routes::EXPORT_STUDENTS, &admin).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.text.lines().count(), 3);
        assert!(res.text.contains("21cs002@college.edu"));
    }

    #[tokio::test]
    async fn proofs_zip_groups_files_by_roll_number() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;
        let id = app.submit_achievement(&student.token, json!({})).await;

        let res = app.get_with_token(routes::EXPORT_PROOFS, &admin).await;

        assert_eq!(res.status, 200);
        let mut archive = zip::ZipArchive::new(Cursor::new(res.bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        let entry = archive.by_index(0).unwrap();
        assert!(entry.name().starts_with(&format!("21CS001/{id}-")));
    }

    #[tokio::test]
    async fn students_cannot_export() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .get_with_token(routes::EXPORT_STUDENTS, &student.token)
            .await;

        assert_eq!(res.status, 403);
    }
}

mod announcements {
    use super::*;

    #[tokio::test]
    async fn admin_publishes_and_everyone_reads() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let student = app.create_student("21CS001").await;

        let created = app
            .post_with_token(
                routes::ANNOUNCEMENTS,
                &json!({"title": "Portal closes Friday", "content": "Submit pending certificates."}),
                &admin,
            )
            .await;
        assert_eq!(created.status, 201, "{}", created.text);
        let id = created.id();

        let list = app.get_with_token(routes::ANNOUNCEMENTS, &student.token).await;
        assert_eq!(list.status, 200);
        assert_eq!(list.body["data"][0]["title"], "Portal closes Friday");

        let updated = app
            .patch_with_token(
                &routes::announcement(id),
                &json!({"title": "Portal closes Monday"}),
                &admin,
            )
            .await;
        assert_eq!(updated.status, 200, "{}", updated.text);
        assert_eq!(updated.body["title"], "Portal closes Monday");
        assert_eq!(updated.body["content"], "Submit pending certificates.");

        let deleted = app.delete_with_token(&routes::announcement(id), &admin).await;
        assert_eq!(deleted.status, 204);
        let again = app.delete_with_token(&routes::announcement(id), &admin).await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn students_cannot_publish() {
        let app = TestApp::spawn().await;
        let student = app.create_student("21CS001").await;

        let res = app
            .post_with_token(
                routes::ANNOUNCEMENTS,
                &json!({"title": "Free points", "content": "Not really."}),
                &student.token,
            )
            .await;

        assert_eq!(res.status, 403);
    }
}
