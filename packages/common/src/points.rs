//! Points awarded for approved achievements.
//!
//! Base points come from the achievement level; competitions scale the base
//! by the award multiplier. Unknown levels fall back to
//! [`DEFAULT_BASE_POINTS`], unknown awards to [`DEFAULT_AWARD_MULTIPLIER`].

use crate::achievement::AchievementType;

/// Base points per level name.
pub const LEVEL_POINTS: &[(&str, i32)] = &[
    ("International", 150),
    ("National", 100),
    ("State", 80),
    ("District", 60),
    ("College", 40),
    ("Department", 20),
];

pub const DEFAULT_BASE_POINTS: i32 = 10;

/// Award multipliers for competitions. Several spellings map to each placing.
pub const AWARD_MULTIPLIERS: &[(&[&str], f64)] = &[
    (&["1", "1st", "first", "winner"], 2.0),
    (&["2", "2nd", "second"], 1.5),
    (&["3", "3rd", "third"], 1.2),
    (&["runner", "runner-up", "runnerup", "runner up"], 1.1),
    (&["participation", "participant"], 0.5),
];

pub const DEFAULT_AWARD_MULTIPLIER: f64 = 0.5;

/// Look up the base points for a level name (case-insensitive).
pub fn base_points(level: &str) -> i32 {
    let level = level.trim();
    LEVEL_POINTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(level))
        .map(|&(_, points)| points)
        .unwrap_or(DEFAULT_BASE_POINTS)
}

/// Look up the multiplier for an award string (case-insensitive).
pub fn award_multiplier(award: &str) -> f64 {
    let award = award.trim().to_ascii_lowercase();
    AWARD_MULTIPLIERS
        .iter()
        .find(|(names, _)| names.contains(&award.as_str()))
        .map(|&(_, multiplier)| multiplier)
        .unwrap_or(DEFAULT_AWARD_MULTIPLIER)
}

/// Points for an achievement of the given type, level, and optional award.
///
/// Certifications always get the base points. Competitions without an award
/// also get the base points.
pub fn calculate_points(kind: AchievementType, level: &str, award: Option<&str>) -> i32 {
    let base = base_points(level);
    match (kind, award) {
        (AchievementType::Competition, Some(award)) => {
            (f64::from(base) * award_multiplier(award)).round() as i32
        }
        _ => base,
    }
}
