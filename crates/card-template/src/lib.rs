mod document;
mod fill;
mod types;

pub mod data;
pub mod source;

pub use document::*;
pub use fill::fill;
pub use types::*;
