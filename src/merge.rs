//! Field merge engine
//!
//! Populates every declared field of every required form from the extractor's
//! candidates. Matching is literal on field id, so a field id shared by several
//! forms always receives the same value. Unmatched fields stay explicitly empty.

use crate::error::MergeError;
use crate::extractor::CandidateFields;
use crate::state::{FilledForm, FormField, FormFieldValues, RequiredForm};

pub fn merge(
    forms: &[RequiredForm],
    candidates: &CandidateFields,
) -> Result<FormFieldValues, MergeError> {
    if forms.is_empty() {
        tracing::error!("merge called with an empty required form list");
        return Err(MergeError::EmptyRequiredFormList);
    }

    let filled: Vec<FilledForm> = forms.iter().map(|form| fill_form(form, candidates)).collect();

    let unused = candidates
        .keys()
        .filter(|id| !forms.iter().any(|form| form.declares(id)))
        .count();
    if unused > 0 {
        tracing::debug!(unused, "candidates not declared by any required form");
    }

    Ok(FormFieldValues::from_forms(filled))
}

fn fill_form(form: &RequiredForm, candidates: &CandidateFields) -> FilledForm {
    let fields: Vec<FormField> = form
        .fields
        .iter()
        .map(|field_id| match candidates.get(field_id) {
            Some(candidate) => FormField::from_candidate(field_id, candidate),
            None => FormField::empty(field_id),
        })
        .collect();

    let filled = FilledForm {
        form_name: form.form_name.clone(),
        description: form.description.clone(),
        fields,
    };
    tracing::debug!(
        form = %filled.form_name,
        filled = filled.filled_count(),
        total = filled.fields.len(),
        "filled form"
    );
    filled
}
