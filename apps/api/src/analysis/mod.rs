pub mod handlers;
pub mod history;
pub mod service;
