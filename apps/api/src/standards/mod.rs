// Achievement standards: catalog, keyword/LLM matcher, domain feedback table.

pub mod catalog;
pub mod feedback;
pub mod handlers;
pub mod matcher;
pub mod prompts;
