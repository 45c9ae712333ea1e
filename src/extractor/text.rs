//! Reference extractor for plain-text documents
//!
//! Reads `Label: value` (or `Label = value`) lines and maps each label onto
//! the normalized vocabulary. Binary documents such as scans are skipped;
//! a real OCR backend would be substituted behind the same trait.

use super::traits::{CandidateFields, ExtractedField, FieldExtractor};
use super::vocabulary::{normalize_label, LabelMatch};
use crate::error::ExtractionError;
use crate::state::UploadedDocument;
use async_trait::async_trait;

const EXACT_CONFIDENCE: f32 = 1.0;
const ALIAS_CONFIDENCE: f32 = 0.8;

/// Line-oriented key/value extractor
#[derive(Debug, Clone, Default)]
pub struct TextFieldExtractor;

impl TextFieldExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(line: &str) -> Option<(&str, &str)> {
        let (label, value) = line.split_once(':').or_else(|| line.split_once('='))?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some((label.trim(), value))
    }

    fn extract_document(document: &UploadedDocument) -> Vec<ExtractedField> {
        let Some(text) = document.text() else {
            tracing::debug!(document = %document.display_name, "skipping non-text document");
            return Vec::new();
        };

        text.lines()
            .filter_map(Self::parse_line)
            .filter_map(|(label, value)| {
                let matched = normalize_label(label)?;
                let confidence = match matched {
                    LabelMatch::Exact(_) => EXACT_CONFIDENCE,
                    LabelMatch::Alias(_) => ALIAS_CONFIDENCE,
                };
                Some(
                    ExtractedField::new(matched.field_id(), value)
                        .with_confidence(confidence)
                        .with_source(&document.display_name),
                )
            })
            .collect()
    }
}

#[async_trait]
impl FieldExtractor for TextFieldExtractor {
    async fn extract(
        &self,
        documents: &[UploadedDocument],
    ) -> Result<CandidateFields, ExtractionError> {
        let mut candidates = CandidateFields::new();

        for document in documents {
            for field in Self::extract_document(document) {
                // Earlier documents win ties; only a strictly more confident match replaces.
                let replace = candidates
                    .get(&field.field_id)
                    .map_or(true, |existing| field.confidence > existing.confidence);
                if replace {
                    candidates.insert(field.field_id.clone(), field);
                }
            }
            tokio::task::yield_now().await;
        }

        if candidates.is_empty() {
            return Err(ExtractionError::NoExtractableContent);
        }
        tracing::debug!(count = candidates.len(), "extracted candidate fields");
        Ok(candidates)
    }
}
