pub mod achievement;
pub mod points;

#[cfg(feature = "storage")]
pub mod storage;

pub use achievement::{AchievementLevel, AchievementStatus, AchievementType, ErpStatus};
