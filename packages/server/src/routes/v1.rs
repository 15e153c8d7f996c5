use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/uploads", upload_routes(config.storage.max_upload_size))
        .nest("/achievements", achievement_routes())
        .nest("/admin", admin_routes())
        .nest("/erp", erp_routes())
        .nest("/students", student_routes())
        .nest("/leaderboard", leaderboard_routes())
        .nest("/announcements", announcement_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register_student))
        .routes(routes!(handlers::auth::login_student))
        .routes(routes!(handlers::auth::login_admin))
        .routes(routes!(handlers::auth::register_admin))
        .routes(routes!(handlers::auth::me))
}

fn upload_routes(max_upload_size: u64) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::upload::upload_file))
        .layer(handlers::upload::upload_body_limit(max_upload_size));

    OpenApiRouter::new()
        .routes(routes!(handlers::upload::download_file))
        .merge(upload)
}

fn achievement_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::achievement::create_achievement,
            handlers::achievement::list_achievements
        ))
        .routes(routes!(
            handlers::achievement::get_achievement,
            handlers::achievement::delete_achievement
        ))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/achievements", review_routes())
        .nest("/erp", erp_review_routes())
        .routes(routes!(handlers::admin::list_students))
        .routes(routes!(handlers::admin::get_student))
        .routes(routes!(handlers::admin::adjust_points))
        .routes(routes!(handlers::admin::reconcile_points))
        .routes(routes!(handlers::admin::get_stats))
        .routes(routes!(handlers::admin::export_achievements))
        .routes(routes!(handlers::admin::export_students))
        .routes(routes!(handlers::admin::export_proofs))
}

fn review_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::achievement::approve_achievement))
        .routes(routes!(handlers::achievement::reject_achievement))
        .routes(routes!(handlers::achievement::validate_achievement))
}

fn erp_review_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::erp::list_profiles))
        .routes(routes!(handlers::erp::verify_profile))
        .routes(routes!(handlers::erp::reject_profile))
}

fn erp_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::erp::get_my_profile,
            handlers::erp::upsert_my_profile
        ))
        .routes(routes!(handlers::erp::submit_my_profile))
}

fn student_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(
        handlers::student::get_me,
        handlers::student::update_me
    ))
}

fn leaderboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::student::leaderboard))
}

fn announcement_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::announcement::list_announcements,
            handlers::announcement::create_announcement
        ))
        .routes(routes!(
            handlers::announcement::update_announcement,
            handlers::announcement::delete_announcement
        ))
}
