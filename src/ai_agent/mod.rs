pub mod agents;
pub mod data;
pub mod llm;
pub mod tools;
