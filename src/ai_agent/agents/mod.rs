pub mod advisor;
pub mod prompts;
pub mod strategic_analyst;
