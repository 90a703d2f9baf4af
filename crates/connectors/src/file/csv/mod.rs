pub mod appender;
pub mod error;
pub mod header;

pub use appender::{AppendSummary, CsvAppender, count_rows, read_header};
pub use header::{Header, HeaderPolicy};
