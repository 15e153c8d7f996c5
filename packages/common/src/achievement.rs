#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of achievement a student can claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum AchievementType {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Certification"))]
    Certification,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Competition"))]
    Competition,
}

impl AchievementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certification => "Certification",
            Self::Competition => "Competition",
        }
    }
}

/// Scope at which an achievement was earned, ordered from narrowest to widest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum AchievementLevel {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Department"))]
    Department,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "College"))]
    College,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "District"))]
    District,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "State"))]
    State,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "National"))]
    National,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "International"))]
    International,
}

impl AchievementLevel {
    pub const ALL: &'static [AchievementLevel] = &[
        Self::Department,
        Self::College,
        Self::District,
        Self::State,
        Self::National,
        Self::International,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Department => "Department",
            Self::College => "College",
            Self::District => "District",
            Self::State => "State",
            Self::National => "National",
            Self::International => "International",
        }
    }

    /// Department and College.
    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Department | Self::College)
    }

    /// National and International.
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::National | Self::International)
    }
}

/// Review state of an achievement. `Approved` and `Rejected` are terminal.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "approved"))]
    Approved,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
}

impl AchievementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Verification state of a student's ERP profile.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum ErpStatus {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "draft"))]
    Draft,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "submitted"))]
    Submitted,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "verified"))]
    Verified,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
}

impl ErpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

macro_rules! impl_display_from_str {
    ($ty:ty, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case(<$ty>::$variant.as_str()) {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err(ParseEnumError {
                    kind: stringify!($ty),
                    invalid: s.to_string(),
                })
            }
        }
    };
}

impl_display_from_str!(AchievementType, [Certification, Competition]);
impl_display_from_str!(
    AchievementLevel,
    [Department, College, District, State, National, International]
);
impl_display_from_str!(AchievementStatus, [Pending, Approved, Rejected]);
impl_display_from_str!(ErpStatus, [Draft, Submitted, Verified, Rejected]);

/// Error when parsing an unknown enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    invalid: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.invalid)
    }
}

impl std::error::Error for ParseEnumError {}
