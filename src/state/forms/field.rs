//! Form field value objects

use crate::extractor::ExtractedField;
use serde::Serialize;

/// Where a field's current value came from
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum FieldValue {
    /// Nothing was extracted and the user has not typed anything
    #[default]
    Empty,
    Extracted {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Edited {
        value: String,
    },
}

/// A single declared field of a required form with its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub value: FieldValue,
}

impl FormField {
    /// Create an empty field for a declared field id
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: field_label(name),
            value: FieldValue::Empty,
        }
    }

    /// Create a field holding an extracted candidate's value as given
    pub fn from_candidate(name: &str, candidate: &ExtractedField) -> Self {
        Self {
            name: name.to_string(),
            label: field_label(name),
            value: FieldValue::Extracted {
                value: candidate.value.clone(),
                confidence: candidate.confidence,
                source: candidate.source.clone(),
            },
        }
    }

    /// Get the text value (empty string for empty fields)
    pub fn as_text(&self) -> &str {
        self.value().unwrap_or("")
    }

    pub fn value(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Empty => None,
            FieldValue::Extracted { value, .. } | FieldValue::Edited { value } => Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value().map_or(true, |v| v.trim().is_empty())
    }

    pub fn is_edited(&self) -> bool {
        matches!(self.value, FieldValue::Edited { .. })
    }

    /// Overwrite the value with a user edit
    pub fn set_text(&mut self, value: String) {
        self.value = FieldValue::Edited { value };
    }
}

/// Turn a camelCase field id into a display label (`dateOfBirth` -> "Date Of Birth")
pub fn field_label(field_id: &str) -> String {
    let mut label = String::with_capacity(field_id.len() + 4);
    for (i, c) in field_id.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            label.push(' ');
            label.push(c);
        } else {
            label.push(c);
        }
    }
    label
}
