//! Visa Wizard - document-to-form pipeline for visa applications
//!
//! Resolves the forms a destination and visa type require, extracts candidate
//! values from uploaded documents, merges them into every form, and keeps the
//! multi-form state editable until the application is finalized.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod merge;
pub mod session;
pub mod state;

pub use error::{CatalogError, ErrorCategory, ExtractionError, MergeError, SessionError};
pub use session::{ApplicationSession, FinalizedApplication, SessionOptions, SessionSnapshot};
