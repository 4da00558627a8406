pub mod cleanup;
pub mod handlers;
pub mod schedule;
