pub mod grader;
pub mod handlers;
pub mod prompts;
