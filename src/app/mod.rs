pub mod auth;
pub mod config;
pub mod controller;
pub mod factory;
pub mod routes;
pub mod services;
