//! Elasticsearch document store for quadrant documents.

mod bulk;
mod client;
mod schema;

pub use bulk::BulkIndexer;
pub use client::EsClient;
pub use schema::create_index;
