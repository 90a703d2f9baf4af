pub mod dataset;
pub mod identifiers;
pub mod value;
