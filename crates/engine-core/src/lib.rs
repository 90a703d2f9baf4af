pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod retry;
pub mod state;
