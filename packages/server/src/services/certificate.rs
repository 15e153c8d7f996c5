//! Certificate validation: an external visual analysis merged with four
//! local rule checks into a 0-100 trust score.

use chrono::{DateTime, Months, NaiveDate, Utc};
use common::{AchievementLevel, AchievementType};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::vision::{VisionClient, extract_json_object};

/// Issuers recognized as legitimate certificate providers (substring match).
pub const KNOWN_ISSUERS: &[&str] = &[
    "coursera",
    "udemy",
    "edx",
    "linkedin learning",
    "google",
    "microsoft",
    "aws",
    "amazon",
    "ibm",
    "oracle",
    "cisco",
    "nptel",
    "swayam",
    "hackerrank",
    "hackerearth",
    "codechef",
    "infosys springboard",
    "nasscom",
    "meta",
];

/// Issuers credible for an International-level certification.
pub const GLOBAL_BRANDS: &[&str] = &[
    "google",
    "microsoft",
    "aws",
    "amazon",
    "ibm",
    "oracle",
    "cisco",
    "meta",
];

/// Title keywords expected for each category.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "certification",
        &["certificate", "certification", "certified", "credential", "exam", "associate", "professional"],
    ),
    (
        "competition",
        &["competition", "contest", "hackathon", "challenge", "olympiad", "championship", "quiz", "tournament"],
    ),
    (
        "course",
        &["course", "training", "program", "bootcamp", "workshop", "specialization", "class"],
    ),
    (
        "project",
        &["project", "prototype", "application", "app", "system", "research", "development"],
    ),
];

const WEIGHT_AUTHENTICITY: f64 = 0.30;
const WEIGHT_ISSUER: f64 = 0.25;
const WEIGHT_CONTENT: f64 = 0.20;
const WEIGHT_QUALITY: f64 = 0.15;
const WEIGHT_CHECKS: f64 = 0.10;

pub const VALID_THRESHOLD: u32 = 70;
const LOW_SCORE: f64 = 40.0;
const MAX_AGE_YEARS: u32 = 10;

pub const AI_ANALYSIS_FAILED: &str = "AI_ANALYSIS_FAILED";

/// Achievement fields the validator looks at.
#[derive(Clone, Debug)]
pub struct CertificateContext {
    pub title: String,
    pub achievement_type: AchievementType,
    pub category: String,
    pub level: AchievementLevel,
    pub issuer: Option<String>,
    pub achievement_date: Option<String>,
    pub student_name: String,
}

/// Sub-scores reported by the image model. Missing scores are `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AiAnalysis {
    pub authenticity_score: Option<f64>,
    pub issuer_legitimacy: Option<f64>,
    pub content_accuracy: Option<f64>,
    pub technical_quality: Option<f64>,
    pub fraud_indicators: Vec<String>,
    pub positive_indicators: Vec<String>,
    pub recommendation: Option<String>,
}

impl AiAnalysis {
    /// Neutral placeholder used when the model call or its parse fails.
    pub fn fallback() -> Self {
        Self {
            authenticity_score: Some(50.0),
            issuer_legitimacy: Some(50.0),
            content_accuracy: Some(50.0),
            technical_quality: Some(50.0),
            fraud_indicators: vec![AI_ANALYSIS_FAILED.to_string()],
            positive_indicators: Vec::new(),
            recommendation: Some("MANUAL_REVIEW".to_string()),
        }
    }
}

/// Parse model output into an analysis. `None` means unparseable.
pub fn parse_ai_analysis(text: &str) -> Option<AiAnalysis> {
    let json = extract_json_object(text)?;
    serde_json::from_str(json).ok()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckResult {
    pub passed: bool,
    pub issues: Vec<String>,
}

impl CheckResult {
    fn pass() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
        }
    }

    fn fail(issue: impl Into<String>) -> Self {
        Self {
            passed: false,
            issues: vec![issue.into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VerificationChecks {
    pub date: CheckResult,
    pub issuer: CheckResult,
    pub category: CheckResult,
    pub level: CheckResult,
}

impl VerificationChecks {
    fn iter(&self) -> impl Iterator<Item = &CheckResult> {
        [&self.date, &self.issuer, &self.category, &self.level].into_iter()
    }

    /// Percentage of checks that passed.
    pub fn pass_rate(&self) -> f64 {
        let passed = self.iter().filter(|c| c.passed).count();
        passed as f64 / 4.0 * 100.0
    }
}

/// Stored verdict of a certificate validation.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationVerdict {
    pub proof_file: String,
    pub trust_score: u32,
    pub is_valid: bool,
    pub ai_analysis: AiAnalysis,
    pub checks: VerificationChecks,
    pub red_flags: Vec<String>,
    pub recommendations: Vec<String>,
    pub validated_at: DateTime<Utc>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    ["%d/%m/%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn check_date(raw: Option<&str>, today: NaiveDate) -> CheckResult {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return CheckResult::pass();
    };
    let Some(date) = parse_date(raw) else {
        return CheckResult::fail(format!("Unrecognized date format: {raw}"));
    };
    if date > today {
        return CheckResult::fail("Achievement date is in the future");
    }
    let oldest = today
        .checked_sub_months(Months::new(12 * MAX_AGE_YEARS))
        .unwrap_or(NaiveDate::MIN);
    if date < oldest {
        return CheckResult::fail(format!(
            "Achievement date is more than {MAX_AGE_YEARS} years old"
        ));
    }
    CheckResult::pass()
}

pub fn check_issuer(issuer: Option<&str>) -> CheckResult {
    let Some(issuer) = issuer.map(str::trim).filter(|s| !s.is_empty()) else {
        return CheckResult::fail("Issuer is missing");
    };
    let lower = issuer.to_lowercase();
    if KNOWN_ISSUERS.iter().any(|known| lower.contains(known)) {
        CheckResult::pass()
    } else {
        CheckResult::fail(format!("Issuer '{issuer}' is not a recognized provider"))
    }
}

pub fn check_category(category: &str, title: &str) -> CheckResult {
    let category = category.trim().to_lowercase();
    let Some((_, keywords)) = CATEGORY_KEYWORDS.iter().find(|(name, _)| *name == category) else {
        return CheckResult::pass();
    };
    let title = title.to_lowercase();
    if keywords.iter().any(|k| title.contains(k)) {
        CheckResult::pass()
    } else {
        CheckResult::fail(format!("Title does not match category '{category}'"))
    }
}

pub fn check_level(ctx: &CertificateContext) -> CheckResult {
    let is_certification = ctx.achievement_type == AchievementType::Certification
        || ctx.category.trim().eq_ignore_ascii_case("certification");
    if !is_certification || ctx.level != AchievementLevel::International {
        return CheckResult::pass();
    }
    let issuer = ctx.issuer.as_deref().unwrap_or_default().to_lowercase();
    if GLOBAL_BRANDS.iter().any(|b| issuer.contains(b)) {
        CheckResult::pass()
    } else {
        CheckResult::fail("International level claimed for a certification from a non-global issuer")
    }
}

pub fn run_checks(ctx: &CertificateContext, today: NaiveDate) -> VerificationChecks {
    VerificationChecks {
        date: check_date(ctx.achievement_date.as_deref(), today),
        issuer: check_issuer(ctx.issuer.as_deref()),
        category: check_category(&ctx.category, &ctx.title),
        level: check_level(ctx),
    }
}

/// Weighted blend of the present sub-scores, renormalized by the weights used.
pub fn trust_score(ai: &AiAnalysis, local_pass_rate: Option<f64>) -> u32 {
    let terms = [
        (ai.authenticity_score, WEIGHT_AUTHENTICITY),
        (ai.issuer_legitimacy, WEIGHT_ISSUER),
        (ai.content_accuracy, WEIGHT_CONTENT),
        (ai.technical_quality, WEIGHT_QUALITY),
        (local_pass_rate, WEIGHT_CHECKS),
    ];
    let (sum, weights) = terms
        .iter()
        .filter_map(|(value, weight)| value.map(|v| (v.clamp(0.0, 100.0) * weight, *weight)))
        .fold((0.0, 0.0), |(s, w), (v, wt)| (s + v, w + wt));
    if weights == 0.0 {
        return 0;
    }
    (sum / weights).round() as u32
}

pub fn red_flags(ai: &AiAnalysis, checks: &VerificationChecks) -> Vec<String> {
    let mut flags: Vec<String> = ai
        .fraud_indicators
        .iter()
        .map(|f| format!("AI: {f}"))
        .collect();

    if let Some(score) = ai.authenticity_score.filter(|s| *s < LOW_SCORE) {
        flags.push(format!("Low authenticity score ({score:.0})"));
    }
    if let Some(score) = ai.issuer_legitimacy.filter(|s| *s < LOW_SCORE) {
        flags.push(format!("Low issuer legitimacy score ({score:.0})"));
    }

    flags.extend(
        checks
            .iter()
            .filter(|c| !c.passed)
            .filter_map(|c| c.issues.first().cloned()),
    );
    flags
}

pub fn recommendations(trust_score: u32, ai: &AiAnalysis) -> Vec<String> {
    let band = match trust_score {
        80.. => "Certificate appears authentic; safe to approve",
        60..=79 => "Likely authentic; verify key details before approving",
        40..=59 => "Questionable certificate; request additional proof from the student",
        _ => "High likelihood of fraud; reject or escalate for investigation",
    };
    let mut out = vec![band.to_string()];
    if !ai.fraud_indicators.is_empty() {
        out.push(format!(
            "Fraud indicators: {}",
            ai.fraud_indicators.join(", ")
        ));
    }
    out
}

fn build_prompt(ctx: &CertificateContext) -> String {
    format!(
        "You are verifying a student's achievement certificate.\n\
         Claimed title: {title}\n\
         Category: {category}\n\
         Level: {level}\n\
         Issuer: {issuer}\n\
         Student name: {student}\n\n\
         Inspect the image and reply with only a JSON object with the keys \
         authenticityScore, issuerLegitimacy, contentAccuracy, technicalQuality \
         (numbers 0-100), fraudIndicators and positiveIndicators (arrays of strings) \
         and recommendation (APPROVE, REJECT or MANUAL_REVIEW).",
        title = ctx.title,
        category = ctx.category,
        level = ctx.level,
        issuer = ctx.issuer.as_deref().unwrap_or("unknown"),
        student = ctx.student_name,
    )
}

/// Ask the image model about the certificate, degrading to neutral scores
/// when the call fails or its answer cannot be parsed.
pub async fn analyze_image(
    vision: &dyn VisionClient,
    image: &[u8],
    mime_type: &str,
    ctx: &CertificateContext,
) -> AiAnalysis {
    let prompt = build_prompt(ctx);
    match vision.describe(image, mime_type, &prompt).await {
        Ok(text) => parse_ai_analysis(&text).unwrap_or_else(|| {
            warn!("Vision model returned unparseable output");
            AiAnalysis::fallback()
        }),
        Err(e) => {
            warn!(error = %e, "Vision analysis failed");
            AiAnalysis::fallback()
        }
    }
}

/// Combine a model analysis with the local checks into a verdict.
pub fn build_verdict(
    proof_file: &str,
    ai: AiAnalysis,
    ctx: &CertificateContext,
    now: DateTime<Utc>,
) -> ValidationVerdict {
    let checks = run_checks(ctx, now.date_naive());
    let score = trust_score(&ai, Some(checks.pass_rate()));
    ValidationVerdict {
        proof_file: proof_file.to_string(),
        trust_score: score,
        is_valid: score >= VALID_THRESHOLD,
        red_flags: red_flags(&ai, &checks),
        recommendations: recommendations(score, &ai),
        ai_analysis: ai,
        checks,
        validated_at: now,
    }
}
