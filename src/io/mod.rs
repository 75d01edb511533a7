mod s3_store;
mod store;

pub use s3_store::{create_s3_client, S3Store};
pub use store::{LocalStore, SourceStore};
