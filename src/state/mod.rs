//! Application state module

mod documents;
mod forms;
mod selection;
mod wizard;

pub use documents::*;
pub use forms::*;
pub use selection::*;
pub use wizard::*;
