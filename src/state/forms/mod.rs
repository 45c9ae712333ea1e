//! Form domain layer
//!
//! Required form schemas, per-field values with provenance, and the
//! multi-form value set the merge engine produces.

mod field;
mod form_values;

pub use field::{field_label, FieldValue, FormField};
pub use form_values::{FilledForm, FormFieldValues, FormSummary, RequiredForm};
