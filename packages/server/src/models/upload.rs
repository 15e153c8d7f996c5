use serde::Serialize;

/// A stored proof file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    /// Reference to put in an achievement's `proof_files`.
    #[schema(example = "/uploads/0190f5c2d7e84b5a9d3c1f2e3a4b5c6d-certificate.png")]
    pub path: String,
    #[schema(example = "0190f5c2d7e84b5a9d3c1f2e3a4b5c6d-certificate.png")]
    pub filename: String,
    #[schema(example = 182044)]
    pub size: u64,
    #[schema(example = "image/png")]
    pub content_type: String,
}
