pub mod error;
pub mod file;
pub mod mongo;
pub mod source;
pub mod storage;
