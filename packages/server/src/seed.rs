use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::config::BootstrapAdmin;
use crate::entity::{achievement, admin};
use crate::utils::hash;

/// Create the configured bootstrap admin if no admin with that email exists.
pub async fn seed_bootstrap_admin(
    db: &DatabaseConnection,
    bootstrap: Option<&BootstrapAdmin>,
) -> Result<(), DbErr> {
    let Some(bootstrap) = bootstrap else {
        return Ok(());
    };

    let email = bootstrap.email.trim().to_lowercase();
    let existing = admin::Entity::find()
        .filter(admin::Column::Email.eq(&email))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password = hash::hash_password(&bootstrap.password)
        .map_err(|e| DbErr::Custom(format!("Password hash error: {e}")))?;

    let model = admin::ActiveModel {
        name: Set(bootstrap.name.trim().to_string()),
        email: Set(email.clone()),
        password: Set(password),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = admin::Entity::insert(model)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(admin::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(_) => info!(email = %email, "Seeded bootstrap admin"),
        Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e),
    }

    Ok(())
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Student history scans for the suspicious-activity detector:
    // SELECT ... FROM achievement WHERE student_id = ? ORDER BY created_at DESC
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_achievement_student_created")
        .table(achievement::Entity)
        .col(achievement::Column::StudentId)
        .col(achievement::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => info!("Ensured index idx_achievement_student_created exists"),
        Err(e) => warn!(
            "Failed to create index idx_achievement_student_created: {}",
            e
        ),
    }

    // Admin review queue and cross-student window:
    // SELECT ... FROM achievement WHERE status = ? AND created_at > ?
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_achievement_status_created")
        .table(achievement::Entity)
        .col(achievement::Column::Status)
        .col(achievement::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => info!("Ensured index idx_achievement_status_created exists"),
        Err(e) => warn!(
            "Failed to create index idx_achievement_status_created: {}",
            e
        ),
    }

    Ok(())
}
