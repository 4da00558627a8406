pub mod handlers;
pub mod phase;
pub mod prompts;
pub mod repository;
pub mod responses;
