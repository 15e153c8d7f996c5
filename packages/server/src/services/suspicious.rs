//! Suspicious-activity detection for new achievement submissions.
//!
//! Six independent pattern checks each contribute a fixed number of points
//! to a risk score capped at 100. The detector is advisory: it never blocks a
//! submission and its failure only drops the verdict.

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use common::{AchievementLevel, AchievementStatus};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::entity::achievement;
use crate::utils::similarity::similarity;

const BULK_WINDOW_DAYS: i64 = 7;
const BULK_THRESHOLD: usize = 5;
const RECENT_WINDOW_DAYS: i64 = 30;
const PROGRESSION_MAX_RECENT: usize = 2;
const TITLE_SIMILARITY: f64 = 0.8;
const ISSUER_SIMILARITY: f64 = 0.9;
const NIGHT_RATIO: f64 = 0.8;
const TIMING_MIN_SAMPLES: usize = 3;
const INTERVAL_MIN_HISTORY: usize = 3;
const CROSS_STUDENT_THRESHOLD: usize = 3;

pub const SUSPICIOUS_THRESHOLD: u32 = 50;
pub const REVIEW_THRESHOLD: u32 = 30;
const MAX_RISK: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingType {
    BulkSubmission,
    DuplicateSubmission,
    UnrealisticProgression,
    SuspiciousTiming,
    RegularIntervalSubmission,
    CrossStudentPattern,
}

impl FindingType {
    /// Contribution of this finding to the risk score.
    pub fn weight(self) -> u32 {
        match self {
            Self::BulkSubmission => 25,
            Self::DuplicateSubmission => 30,
            Self::UnrealisticProgression => 20,
            Self::SuspiciousTiming => 15,
            Self::RegularIntervalSubmission => 10,
            Self::CrossStudentPattern => 35,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::DuplicateSubmission | Self::CrossStudentPattern => Severity::High,
            Self::BulkSubmission | Self::UnrealisticProgression => Severity::Medium,
            Self::SuspiciousTiming | Self::RegularIntervalSubmission => Severity::Low,
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Self::BulkSubmission => "Confirm the recent burst of submissions with the student",
            Self::DuplicateSubmission => "Compare proof files with the similar earlier submission",
            Self::UnrealisticProgression => {
                "Verify the jump from basic to advanced level achievements"
            }
            Self::SuspiciousTiming => "Note the unusual submission hours when reviewing",
            Self::RegularIntervalSubmission => "Check for scripted or automated submissions",
            Self::CrossStudentPattern => {
                "Cross-check proofs against similar submissions from other students"
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingType,
    pub severity: Severity,
    pub description: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

impl Finding {
    fn new(kind: FindingType, description: String, details: serde_json::Value) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            description,
            details,
        }
    }
}

/// Stored suspicious-activity verdict of one achievement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuspiciousVerdict {
    pub risk_score: u32,
    pub is_suspicious: bool,
    pub requires_review: bool,
    pub patterns: Vec<Finding>,
    pub recommendations: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// One submission as seen by the detector.
#[derive(Clone, Debug)]
pub struct Submission {
    pub title: String,
    pub issuer: Option<String>,
    pub level: AchievementLevel,
    pub created_at: DateTime<Utc>,
}

/// A recent submission by another student.
#[derive(Clone, Debug)]
pub struct PeerSubmission {
    pub student_id: i32,
    pub title: String,
    pub issuer: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn within(created_at: DateTime<Utc>, now: DateTime<Utc>, days: i64) -> bool {
    now - created_at <= Duration::days(days)
}

fn check_bulk(history: &[Submission], now: DateTime<Utc>) -> Option<Finding> {
    let count = history
        .iter()
        .filter(|s| within(s.created_at, now, BULK_WINDOW_DAYS))
        .count();
    (count >= BULK_THRESHOLD).then(|| {
        Finding::new(
            FindingType::BulkSubmission,
            format!("{count} submissions in the last {BULK_WINDOW_DAYS} days"),
            json!({ "count": count, "window_days": BULK_WINDOW_DAYS }),
        )
    })
}

fn check_duplicate(history: &[Submission], candidate: &Submission) -> Option<Finding> {
    let title = normalize(&candidate.title);
    let issuer = non_empty(&candidate.issuer).map(normalize);

    history.iter().find_map(|prior| {
        let title_sim = similarity(&title, &normalize(&prior.title));
        let issuer_sim = match (&issuer, non_empty(&prior.issuer)) {
            (Some(a), Some(b)) => similarity(a, &normalize(b)),
            _ => 0.0,
        };
        (title_sim > TITLE_SIMILARITY || issuer_sim > ISSUER_SIMILARITY).then(|| {
            Finding::new(
                FindingType::DuplicateSubmission,
                format!("Similar to earlier submission '{}'", prior.title),
                json!({
                    "similar_title": prior.title,
                    "title_similarity": (title_sim * 100.0).round() / 100.0,
                    "issuer_similarity": (issuer_sim * 100.0).round() / 100.0,
                }),
            )
        })
    })
}

fn check_progression(
    history: &[Submission],
    candidate: &Submission,
    now: DateTime<Utc>,
) -> Option<Finding> {
    let recent: Vec<&Submission> = history
        .iter()
        .filter(|s| within(s.created_at, now, RECENT_WINDOW_DAYS))
        .collect();
    if recent.len() > PROGRESSION_MAX_RECENT {
        return None;
    }
    let levels: HashSet<AchievementLevel> = recent
        .iter()
        .map(|s| s.level)
        .chain(std::iter::once(candidate.level))
        .collect();
    let basic = levels.iter().any(AchievementLevel::is_basic);
    let advanced = levels.iter().any(AchievementLevel::is_advanced);
    (basic && advanced).then(|| {
        let mut names: Vec<&str> = levels.iter().map(AchievementLevel::as_str).collect();
        names.sort_unstable();
        Finding::new(
            FindingType::UnrealisticProgression,
            "Basic and advanced level achievements claimed within a short period".into(),
            json!({ "levels": names, "recent_count": recent.len() }),
        )
    })
}

fn is_night(hour: u32) -> bool {
    hour >= 23 || hour < 5
}

fn check_timing(
    history: &[Submission],
    candidate: &Submission,
    offset: FixedOffset,
) -> Option<Finding> {
    let hours: Vec<u32> = history
        .iter()
        .chain(std::iter::once(candidate))
        .map(|s| s.created_at.with_timezone(&offset).hour())
        .collect();
    if hours.len() < TIMING_MIN_SAMPLES {
        return None;
    }
    let night = hours.iter().filter(|h| is_night(**h)).count();
    let ratio = night as f64 / hours.len() as f64;
    (ratio > NIGHT_RATIO).then(|| {
        Finding::new(
            FindingType::SuspiciousTiming,
            format!("{night} of {} submissions made between 23:00 and 05:00", hours.len()),
            json!({ "night_submissions": night, "total": hours.len() }),
        )
    })
}

fn check_regular_interval(history: &[Submission]) -> Option<Finding> {
    if history.len() < INTERVAL_MIN_HISTORY {
        return None;
    }
    let mut times: Vec<DateTime<Utc>> = history.iter().map(|s| s.created_at).collect();
    times.sort_unstable();
    let gaps: Vec<f64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 86_400.0)
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (variance < 1.0 && mean < 7.0).then(|| {
        Finding::new(
            FindingType::RegularIntervalSubmission,
            format!("Submissions arrive every {mean:.1} days with little variation"),
            json!({
                "mean_gap_days": (mean * 100.0).round() / 100.0,
                "variance": (variance * 100.0).round() / 100.0,
            }),
        )
    })
}

fn check_cross_student(
    candidate: &Submission,
    peers: &[PeerSubmission],
    now: DateTime<Utc>,
) -> Option<Finding> {
    let issuer = non_empty(&candidate.issuer)?;
    let tokens: HashSet<String> = candidate
        .title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let students: HashSet<i32> = peers
        .iter()
        .filter(|p| within(p.created_at, now, RECENT_WINDOW_DAYS))
        .filter(|p| non_empty(&p.issuer) == Some(issuer))
        .filter(|p| {
            p.title
                .split_whitespace()
                .any(|t| tokens.contains(&t.to_lowercase()))
        })
        .map(|p| p.student_id)
        .collect();

    (students.len() >= CROSS_STUDENT_THRESHOLD).then(|| {
        Finding::new(
            FindingType::CrossStudentPattern,
            format!(
                "{} other students recently submitted similar achievements from '{issuer}'",
                students.len()
            ),
            json!({ "student_count": students.len(), "issuer": issuer }),
        )
    })
}

fn recommendations(risk_score: u32, findings: &[Finding]) -> Vec<String> {
    let band = match risk_score {
        70.. => "High risk: hold for manual verification before approval",
        SUSPICIOUS_THRESHOLD..=69 => "Suspicious: verify proof documents with the issuer",
        REVIEW_THRESHOLD..=49 => "Review recommended: cross-check submission details",
        _ => "No significant risk detected",
    };
    std::iter::once(band.to_string())
        .chain(findings.iter().map(|f| f.kind.recommendation().to_string()))
        .collect()
}

/// Analyze a candidate submission against the student's own history (any
/// order) and other students' recent submissions.
pub fn analyze_submission(
    history: &[Submission],
    candidate: &Submission,
    peers: &[PeerSubmission],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> SuspiciousVerdict {
    let findings: Vec<Finding> = [
        check_bulk(history, now),
        check_duplicate(history, candidate),
        check_progression(history, candidate, now),
        check_timing(history, candidate, offset),
        check_regular_interval(history),
        check_cross_student(candidate, peers, now),
    ]
    .into_iter()
    .flatten()
    .collect();

    let risk_score = findings
        .iter()
        .map(|f| f.kind.weight())
        .sum::<u32>()
        .min(MAX_RISK);

    SuspiciousVerdict {
        risk_score,
        is_suspicious: risk_score >= SUSPICIOUS_THRESHOLD,
        requires_review: risk_score >= REVIEW_THRESHOLD,
        recommendations: recommendations(risk_score, &findings),
        patterns: findings,
        analyzed_at: now,
    }
}

/// Loads detector inputs from the database.
pub struct SuspiciousActivityDetector<'a, C: ConnectionTrait> {
    conn: &'a C,
    offset: FixedOffset,
}

impl<'a, C: ConnectionTrait> SuspiciousActivityDetector<'a, C> {
    pub fn new(conn: &'a C, offset: FixedOffset) -> Self {
        Self { conn, offset }
    }

    /// Analyze `candidate` for `student_id`. The candidate must not be stored yet.
    pub async fn analyze(
        &self,
        student_id: i32,
        candidate: &Submission,
        now: DateTime<Utc>,
    ) -> Result<SuspiciousVerdict, DbErr> {
        let history: Vec<Submission> = achievement::Entity::find()
            .filter(achievement::Column::StudentId.eq(student_id))
            .order_by_desc(achievement::Column::CreatedAt)
            .all(self.conn)
            .await?
            .into_iter()
            .map(|a| Submission {
                title: a.title,
                issuer: a.issuer,
                level: a.level,
                created_at: a.created_at,
            })
            .collect();

        let peers: Vec<PeerSubmission> = achievement::Entity::find()
            .select_only()
            .column(achievement::Column::StudentId)
            .column(achievement::Column::Title)
            .column(achievement::Column::Issuer)
            .column(achievement::Column::CreatedAt)
            .filter(achievement::Column::StudentId.ne(student_id))
            .filter(achievement::Column::CreatedAt.gte(now - Duration::days(RECENT_WINDOW_DAYS)))
            .filter(achievement::Column::Status.ne(AchievementStatus::Rejected))
            .into_tuple::<(i32, String, Option<String>, DateTime<Utc>)>()
            .all(self.conn)
            .await?
            .into_iter()
            .map(|(student_id, title, issuer, created_at)| PeerSubmission {
                student_id,
                title,
                issuer,
                created_at,
            })
            .collect();

        Ok(analyze_submission(
            &history,
            candidate,
            &peers,
            now,
            self.offset,
        ))
    }
}
