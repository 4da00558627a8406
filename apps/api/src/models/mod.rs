pub mod chat;
pub mod cover_letter;
pub mod job;
pub mod proposal;
pub mod scrape;
