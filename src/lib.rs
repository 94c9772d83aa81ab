pub mod api;
pub mod auth;
pub mod campus;
pub mod client;
pub mod config;
pub mod db;
pub mod domains;
pub mod models;
pub mod notify;
pub mod store;
