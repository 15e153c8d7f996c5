use common::AchievementStatus;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
    Set, sea_query::LockType,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::entity::{achievement, student};

pub use common::points::calculate_points;

#[derive(Debug, Error)]
pub enum PointsError {
    #[error("student {0} not found")]
    StudentNotFound(i32),
    #[error("point total of student {0} would overflow")]
    Overflow(i32),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Outcome of recomputing a student's total from its sources.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ReconcileReport {
    pub student_id: i32,
    pub previous_total: i32,
    pub total_points: i32,
    /// `total_points - previous_total`; zero when nothing drifted.
    pub drift: i32,
}

/// Applies `delta` to `total` without letting it drop below zero.
/// Returns the new total and the delta actually applied.
pub fn floored(total: i32, delta: i32) -> (i32, i32) {
    let new_total = total.saturating_add(delta).max(0);
    (new_total, new_total - total)
}

fn checked_sum(student_id: i32, total: i32, delta: i32) -> Result<i32, PointsError> {
    total
        .checked_add(delta)
        .ok_or(PointsError::Overflow(student_id))
}

/// Student point bookkeeping. Pass a transaction so the student row lock
/// covers the caller's related writes.
pub struct PointsService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PointsService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    async fn lock_student(&self, student_id: i32) -> Result<student::Model, PointsError> {
        student::Entity::find_by_id(student_id)
            .lock(LockType::Update)
            .one(self.conn)
            .await?
            .ok_or(PointsError::StudentNotFound(student_id))
    }

    /// Add `delta` (may be negative) to the running total, unclamped.
    pub async fn add_points(
        &self,
        student_id: i32,
        delta: i32,
    ) -> Result<student::Model, PointsError> {
        let current = self.lock_student(student_id).await?;
        let total = checked_sum(student_id, current.total_points, delta)?;
        let mut active: student::ActiveModel = current.into();
        active.total_points = Set(total);
        Ok(active.update(self.conn).await?)
    }

    /// Manual admin adjustment, floored at zero. The applied amount is
    /// recorded in `manual_points`.
    pub async fn adjust_points(
        &self,
        student_id: i32,
        delta: i32,
    ) -> Result<(student::Model, i32), PointsError> {
        let current = self.lock_student(student_id).await?;
        let (total, applied) = floored(current.total_points, delta);
        let manual = checked_sum(student_id, current.manual_points, applied)?;
        let mut active: student::ActiveModel = current.into();
        active.total_points = Set(total);
        active.manual_points = Set(manual);
        let updated = active.update(self.conn).await?;
        Ok((updated, applied))
    }

    /// Credit ERP verification points to both the running total and `erp_points`.
    pub async fn award_erp_points(
        &self,
        student_id: i32,
        points: i32,
    ) -> Result<student::Model, PointsError> {
        let current = self.lock_student(student_id).await?;
        let total = checked_sum(student_id, current.total_points, points)?;
        let erp = checked_sum(student_id, current.erp_points, points)?;
        let mut active: student::ActiveModel = current.into();
        active.total_points = Set(total);
        active.erp_points = Set(erp);
        Ok(active.update(self.conn).await?)
    }

    /// Sum of points over the student's approved achievements.
    pub async fn approved_points(&self, student_id: i32) -> Result<i32, PointsError> {
        let sum: Option<Option<i64>> = achievement::Entity::find()
            .select_only()
            .column_as(achievement::Column::Points.sum(), "sum")
            .filter(achievement::Column::StudentId.eq(student_id))
            .filter(achievement::Column::Status.eq(AchievementStatus::Approved))
            .into_tuple()
            .one(self.conn)
            .await?;
        i32::try_from(sum.flatten().unwrap_or(0)).map_err(|_| PointsError::Overflow(student_id))
    }

    /// Recompute `total_points` as approved achievement points plus
    /// `erp_points` plus `manual_points`.
    pub async fn reconcile_points(&self, student_id: i32) -> Result<ReconcileReport, PointsError> {
        let current = self.lock_student(student_id).await?;
        let approved = self.approved_points(student_id).await?;
        let expected = checked_sum(student_id, approved, current.erp_points)?;
        let expected = checked_sum(student_id, expected, current.manual_points)?;
        let previous = current.total_points;

        if expected != previous {
            info!(student_id, previous, expected, "Reconciled drifted point total");
            let mut active: student::ActiveModel = current.into();
            active.total_points = Set(expected);
            active.update(self.conn).await?;
        }

        Ok(ReconcileReport {
            student_id,
            previous_total: previous,
            total_points: expected,
            drift: expected.saturating_sub(previous),
        })
    }
}
