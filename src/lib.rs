pub mod ai_agent;
pub mod app;
