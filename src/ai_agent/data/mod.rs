pub mod history;
pub mod models;
pub mod normalizer;
