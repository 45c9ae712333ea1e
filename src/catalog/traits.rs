//! Trait abstraction for the form catalog to enable substitution and mocking

use crate::error::CatalogError;
use crate::state::RequiredForm;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A visa type offered by a jurisdiction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaTypeEntry {
    pub label: String,
    /// Forms specific to this visa type; the catalog default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<Vec<RequiredForm>>,
}

/// A destination area and the visa types it offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub description: String,
    pub visa_types: Vec<VisaTypeEntry>,
}

impl Jurisdiction {
    /// True if `key` is this jurisdiction's code or display name, ignoring case
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.code.eq_ignore_ascii_case(key) || self.name.eq_ignore_ascii_case(key)
    }

    pub fn visa_type(&self, label: &str) -> Option<&VisaTypeEntry> {
        let label = label.trim();
        self.visa_types
            .iter()
            .find(|v| v.label.eq_ignore_ascii_case(label))
    }

    pub fn visa_type_labels(&self) -> Vec<&str> {
        self.visa_types.iter().map(|v| v.label.as_str()).collect()
    }
}

/// Resolver boundary: which forms a (jurisdiction, visa type) pair requires.
///
/// Implementations must be deterministic; later stages rely on stable field ids.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormCatalog: Send + Sync {
    /// List supported jurisdictions in display order
    async fn jurisdictions(&self) -> Result<Vec<Jurisdiction>, CatalogError>;

    /// Resolve the ordered list of required forms.
    ///
    /// `jurisdiction` may be the code or the display name.
    async fn resolve(
        &self,
        jurisdiction: &str,
        visa_type: &str,
    ) -> Result<Vec<RequiredForm>, CatalogError>;
}
