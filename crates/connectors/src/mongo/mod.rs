mod convert;
pub mod source;

pub use source::MongoDataSource;
