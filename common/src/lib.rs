// Common library for shared code used by the API server

pub mod auth;
pub mod composition;
pub mod config;
pub mod db;
pub mod errors;
pub mod membership;
pub mod models;
pub mod pagination;
pub mod recipes;
pub mod shopping_list;
pub mod telemetry;
