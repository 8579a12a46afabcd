pub mod analyzer;
pub mod handlers;
