//! Form catalog resolver

mod static_catalog;
mod traits;

pub use static_catalog::{CatalogData, StaticCatalog};
pub use traits::{FormCatalog, Jurisdiction, VisaTypeEntry};

#[cfg(test)]
pub use traits::MockFormCatalog;
