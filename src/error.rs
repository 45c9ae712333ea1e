//! Error types for the visa application pipeline

use crate::state::{WizardOperation, WizardStage};
use thiserror::Error;

/// Failures of the form catalog resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unsupported jurisdiction: {0}")]
    UnsupportedJurisdiction(String),

    #[error("unsupported visa type '{visa_type}' for jurisdiction {jurisdiction}")]
    UnsupportedVisaType {
        jurisdiction: String,
        visa_type: String,
    },

    /// Catalog data failed validation or could not be read
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

/// Failures of the field extractor boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The extraction capability is down or unreachable
    #[error("extraction unavailable: {0}")]
    Unavailable(String),

    /// Documents were readable but nothing in them was recognized
    #[error("no extractable content in uploaded documents")]
    NoExtractableContent,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("no required forms to merge into")]
    EmptyRequiredFormList,
}

/// A form field left empty when finalization requires complete forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub form_name: String,
    pub field_id: String,
}

/// Errors returned by [`crate::session::ApplicationSession`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("select a jurisdiction before choosing a visa type")]
    JurisdictionNotSelected,

    #[error("both a jurisdiction and a visa type must be selected")]
    IncompleteSelection,

    #[error("please upload at least one document")]
    NoDocumentsUploaded,

    #[error("unknown form: {0}")]
    UnknownForm(String),

    #[error("unknown field '{field_id}' in form '{form_name}'")]
    UnknownField { form_name: String, field_id: String },

    #[error("{operation} is not allowed during the {stage} stage")]
    InvalidStage {
        operation: &'static str,
        stage: WizardStage,
    },

    #[error("{0} is already in progress")]
    OperationInProgress(WizardOperation),

    /// The session was reset or the selection abandoned while the call was outstanding
    #[error("operation was cancelled and its result discarded")]
    Cancelled,

    #[error("{} required field(s) are still empty", .0.len())]
    IncompleteForms(Vec<MissingField>),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Broad classes of failure, used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User-correctable selection problems, no retry
    Setup,
    /// External dependency failure, the user may retry
    Capability,
    /// Non-fatal content problems
    Content,
    /// Integration defect between resolver, merge and session
    SchemaViolation,
    /// Another stage-changing call is outstanding
    Concurrency,
    /// Operation called in the wrong stage, or its result was discarded
    Workflow,
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::JurisdictionNotSelected | Self::IncompleteSelection | Self::NoDocumentsUploaded => {
                ErrorCategory::Setup
            }
            Self::Catalog(CatalogError::InvalidCatalog(_)) => ErrorCategory::SchemaViolation,
            Self::Catalog(_) => ErrorCategory::Setup,
            Self::Extraction(ExtractionError::Unavailable(_)) => ErrorCategory::Capability,
            Self::Extraction(ExtractionError::NoExtractableContent) => ErrorCategory::Content,
            Self::UnknownForm(_) | Self::UnknownField { .. } | Self::Merge(_) => {
                ErrorCategory::SchemaViolation
            }
            Self::OperationInProgress(_) => ErrorCategory::Concurrency,
            Self::IncompleteForms(_) => ErrorCategory::Setup,
            Self::InvalidStage { .. } | Self::Cancelled => ErrorCategory::Workflow,
        }
    }
}
