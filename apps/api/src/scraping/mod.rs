pub mod fields;
pub mod handlers;
pub mod ingest;
pub mod parser;
