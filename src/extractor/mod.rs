//! Field extractor adapter
//!
//! The boundary to whatever turns documents into candidate field values.

mod text;
mod traits;
pub mod vocabulary;

pub use text::TextFieldExtractor;
pub use traits::{candidates, CandidateFields, ExtractedField, FieldExtractor};

#[cfg(test)]
pub use traits::MockFieldExtractor;
