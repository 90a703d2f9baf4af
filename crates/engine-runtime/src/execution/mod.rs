pub mod artifact;
pub mod executor;
pub mod factory;
pub mod unit;

pub use executor::SyncEngine;
