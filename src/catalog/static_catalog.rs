//! Catalog backed by injected data
//!
//! Data comes from a JSON file or from the built-in defaults. It is
//! validated once on construction so that every resolvable pair yields
//! forms with unique names and unique field ids.

use super::traits::{FormCatalog, Jurisdiction, VisaTypeEntry};
use crate::error::CatalogError;
use crate::extractor::vocabulary::{self, *};
use crate::state::RequiredForm;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Serialized catalog contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogData {
    pub jurisdictions: Vec<Jurisdiction>,
    /// Forms used by visa types that do not declare their own
    #[serde(default)]
    pub default_forms: Vec<RequiredForm>,
}

impl CatalogData {
    /// Schengen, Canada and the UK, each resolving to the standard three forms
    pub fn builtin() -> Self {
        let jurisdiction = |code: &str, name: &str, flag: &str, description: &str, types: &[&str]| {
            Jurisdiction {
                code: code.to_string(),
                name: name.to_string(),
                flag: flag.to_string(),
                description: description.to_string(),
                visa_types: types
                    .iter()
                    .map(|label| VisaTypeEntry {
                        label: label.to_string(),
                        forms: None,
                    })
                    .collect(),
            }
        };

        Self {
            jurisdictions: vec![
                jurisdiction(
                    "SCHENGEN",
                    "Schengen Area",
                    "🇪🇺",
                    "26 European countries including France, Germany, Italy, Spain",
                    &[
                        "Tourist Visa (Short Stay)",
                        "Business Visa (Short Stay)",
                        "Family Visit",
                    ],
                ),
                jurisdiction(
                    "CA",
                    "Canada",
                    "🇨🇦",
                    "Visitor visa and work permit applications",
                    &["Visitor Visa (TRV)", "Work Permit", "Study Permit"],
                ),
                jurisdiction(
                    "UK",
                    "United Kingdom",
                    "🇬🇧",
                    "Standard Visitor visa for tourism and business",
                    &[
                        "Standard Visitor Visa",
                        "Business Visitor",
                        "Family Visitor",
                    ],
                ),
            ],
            default_forms: vec![
                RequiredForm::new(
                    "Visa Application Form",
                    "Main application form for visa",
                    &[
                        FULL_NAME,
                        DATE_OF_BIRTH,
                        PASSPORT_NUMBER,
                        NATIONALITY,
                        EMAIL,
                        PHONE,
                        ADDRESS,
                    ],
                ),
                RequiredForm::new(
                    "Travel Information Form",
                    "Details about your travel plans",
                    &[
                        PURPOSE_OF_VISIT,
                        TRAVEL_DATES,
                        ACCOMMODATION,
                        EMERGENCY_CONTACT,
                    ],
                ),
                RequiredForm::new(
                    "Financial Declaration",
                    "Proof of financial means",
                    &[OCCUPATION, EMPLOYER, MONTHLY_INCOME, BANK_NAME],
                ),
            ],
        }
    }

    /// Check the invariants every resolvable pair depends on
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.jurisdictions.is_empty() {
            return Err(invalid("catalog lists no jurisdictions"));
        }
        validate_forms("default_forms", &self.default_forms)?;

        let mut codes = HashSet::new();
        for jurisdiction in &self.jurisdictions {
            if !codes.insert(jurisdiction.code.to_ascii_uppercase()) {
                return Err(invalid(format!(
                    "duplicate jurisdiction code {}",
                    jurisdiction.code
                )));
            }

            let mut labels = HashSet::new();
            for visa_type in &jurisdiction.visa_types {
                let context = format!("{} / {}", jurisdiction.code, visa_type.label);
                if !labels.insert(visa_type.label.to_lowercase()) {
                    return Err(invalid(format!("duplicate visa type {context}")));
                }
                let forms = visa_type.forms.as_ref().unwrap_or(&self.default_forms);
                if forms.is_empty() {
                    return Err(invalid(format!("{context} resolves to no forms")));
                }
                validate_forms(&context, forms)?;
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> CatalogError {
    CatalogError::InvalidCatalog(message.into())
}

fn validate_forms(context: &str, forms: &[RequiredForm]) -> Result<(), CatalogError> {
    let mut names = HashSet::new();
    for form in forms {
        if !names.insert(form.form_name.as_str()) {
            return Err(invalid(format!(
                "{context}: duplicate form name '{}'",
                form.form_name
            )));
        }
        let mut ids = HashSet::new();
        for field_id in &form.fields {
            if field_id.trim().is_empty() {
                return Err(invalid(format!(
                    "{context}: empty field id in '{}'",
                    form.form_name
                )));
            }
            if !ids.insert(field_id.as_str()) {
                return Err(invalid(format!(
                    "{context}: duplicate field '{field_id}' in '{}'",
                    form.form_name
                )));
            }
            if !vocabulary::is_known(field_id) {
                tracing::warn!(
                    form = %form.form_name,
                    field = %field_id,
                    "field is outside the extractor vocabulary and will never be auto-filled"
                );
            }
        }
    }
    Ok(())
}

/// Form catalog serving validated in-memory data
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    data: CatalogData,
}

impl StaticCatalog {
    pub fn new(data: CatalogData) -> Result<Self, CatalogError> {
        data.validate()?;
        Ok(Self { data })
    }

    pub fn builtin() -> Self {
        Self {
            data: CatalogData::builtin(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData =
            serde_json::from_str(json).map_err(|e| invalid(format!("malformed JSON: {e}")))?;
        Self::new(data)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {e}", path.display())))?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), "loaded form catalog");
        Ok(catalog)
    }

    pub fn data(&self) -> &CatalogData {
        &self.data
    }

    fn lookup(&self, jurisdiction: &str, visa_type: &str) -> Result<&[RequiredForm], CatalogError> {
        let entry = self
            .data
            .jurisdictions
            .iter()
            .find(|j| j.matches(jurisdiction))
            .ok_or_else(|| CatalogError::UnsupportedJurisdiction(jurisdiction.to_string()))?;
        let visa = entry
            .visa_type(visa_type)
            .ok_or_else(|| CatalogError::UnsupportedVisaType {
                jurisdiction: entry.code.clone(),
                visa_type: visa_type.to_string(),
            })?;
        Ok(visa.forms.as_deref().unwrap_or(&self.data.default_forms))
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[async_trait]
impl FormCatalog for StaticCatalog {
    async fn jurisdictions(&self) -> Result<Vec<Jurisdiction>, CatalogError> {
        Ok(self.data.jurisdictions.clone())
    }

    async fn resolve(
        &self,
        jurisdiction: &str,
        visa_type: &str,
    ) -> Result<Vec<RequiredForm>, CatalogError> {
        tokio::task::yield_now().await;
        let forms = self.lookup(jurisdiction, visa_type)?.to_vec();
        tracing::debug!(jurisdiction, visa_type, forms = forms.len(), "resolved required forms");
        Ok(forms)
    }
}
