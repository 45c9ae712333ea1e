//! Trait abstraction for the extraction capability to enable substitution and mocking

use crate::error::ExtractionError;
use crate::state::UploadedDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A candidate value for one normalized field id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub field_id: String,
    pub value: String,
    /// 0.0 - 1.0, when the extractor reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Display name of the document the value came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ExtractedField {
    pub fn new(field_id: &str, value: &str) -> Self {
        Self {
            field_id: field_id.to_string(),
            value: value.to_string(),
            confidence: None,
            source: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// Flat mapping of normalized field id to candidate
pub type CandidateFields = BTreeMap<String, ExtractedField>;

/// Build a candidate map from `(field_id, value)` pairs
pub fn candidates<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> CandidateFields {
    pairs
        .into_iter()
        .map(|(id, value)| (id.to_string(), ExtractedField::new(id, value)))
        .collect()
}

/// Extraction boundary.
///
/// Keys of the returned map must come from the normalized vocabulary in
/// [`super::vocabulary`]; the merge engine matches them literally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Extract candidate field values from the uploaded documents.
    ///
    /// `NoExtractableContent` is not fatal to the workflow.
    async fn extract(
        &self,
        documents: &[UploadedDocument],
    ) -> Result<CandidateFields, ExtractionError>;
}
