pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod recon;
pub mod repositories;
pub mod services;
