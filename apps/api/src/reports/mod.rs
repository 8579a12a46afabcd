pub mod class_report;
pub mod handlers;
pub mod prompts;
