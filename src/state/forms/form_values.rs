//! Required form schemas and the per-form field values produced by merging

use super::field::FormField;
use crate::error::{MissingField, SessionError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A form the selected visa type requires, with its ordered field ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredForm {
    pub form_name: String,
    #[serde(default)]
    pub description: String,
    /// Declared field ids in display and fill order
    pub fields: Vec<String>,
}

impl RequiredForm {
    pub fn new(form_name: &str, description: &str, fields: &[&str]) -> Self {
        Self {
            form_name: form_name.to_string(),
            description: description.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn declares(&self, field_id: &str) -> bool {
        self.fields.iter().any(|f| f == field_id)
    }
}

/// One required form with a value slot for every declared field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilledForm {
    pub form_name: String,
    pub description: String,
    pub fields: Vec<FormField>,
}

impl FilledForm {
    pub fn field(&self, field_id: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == field_id)
    }

    fn field_mut(&mut self, field_id: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.name == field_id)
    }

    pub fn filled_count(&self) -> usize {
        self.fields.iter().filter(|f| !f.is_empty()).count()
    }

    pub fn summary(&self) -> FormSummary {
        FormSummary {
            form_name: self.form_name.clone(),
            filled: self.filled_count(),
            total: self.fields.len(),
            empty_fields: self
                .fields
                .iter()
                .filter(|f| f.is_empty())
                .map(|f| f.name.clone())
                .collect(),
        }
    }
}

/// Completion counts for one form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSummary {
    pub form_name: String,
    pub filled: usize,
    pub total: usize,
    pub empty_fields: Vec<String>,
}

impl FormSummary {
    pub fn is_complete(&self) -> bool {
        self.empty_fields.is_empty()
    }
}

/// Field values for every required form, keyed by form name then field id.
///
/// Never partial relative to the schema it was built from: every declared
/// field has an entry, and edits cannot add entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormFieldValues {
    forms: Vec<FilledForm>,
}

impl FormFieldValues {
    pub(crate) fn from_forms(forms: Vec<FilledForm>) -> Self {
        Self { forms }
    }

    pub fn forms(&self) -> &[FilledForm] {
        &self.forms
    }

    pub fn form(&self, form_name: &str) -> Option<&FilledForm> {
        self.forms.iter().find(|f| f.form_name == form_name)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Look up a field, distinguishing an unknown form from an unknown field
    pub fn get(&self, form_name: &str, field_id: &str) -> Result<&FormField, SessionError> {
        let form = self
            .form(form_name)
            .ok_or_else(|| SessionError::UnknownForm(form_name.to_string()))?;
        form.field(field_id).ok_or_else(|| SessionError::UnknownField {
            form_name: form_name.to_string(),
            field_id: field_id.to_string(),
        })
    }

    /// Overwrite a declared field. Unknown identifiers are rejected, never inserted.
    pub fn set(&mut self, form_name: &str, field_id: &str, value: String) -> Result<(), SessionError> {
        let form = self
            .forms
            .iter_mut()
            .find(|f| f.form_name == form_name)
            .ok_or_else(|| SessionError::UnknownForm(form_name.to_string()))?;
        let field = form
            .field_mut(field_id)
            .ok_or_else(|| SessionError::UnknownField {
                form_name: form_name.to_string(),
                field_id: field_id.to_string(),
            })?;
        field.set_text(value);
        Ok(())
    }

    pub fn summary(&self) -> Vec<FormSummary> {
        self.forms.iter().map(FilledForm::summary).collect()
    }

    /// Every (form, field) pair that is still empty, in form and field order
    pub fn missing_fields(&self) -> Vec<MissingField> {
        self.forms
            .iter()
            .flat_map(|form| {
                form.fields
                    .iter()
                    .filter(|f| f.is_empty())
                    .map(|f| MissingField {
                        form_name: form.form_name.clone(),
                        field_id: f.name.clone(),
                    })
            })
            .collect()
    }
}

struct FieldMap<'a>(&'a FilledForm);

impl Serialize for FieldMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.fields.len()))?;
        for field in &self.0.fields {
            map.serialize_entry(&field.name, &field.value())?;
        }
        map.end()
    }
}

/// Serializes as `{ formName: { fieldId: value-or-null } }` in schema order
impl Serialize for FormFieldValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.forms.len()))?;
        for form in &self.forms {
            map.serialize_entry(&form.form_name, &FieldMap(form))?;
        }
        map.end()
    }
}
