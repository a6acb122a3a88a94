pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod hypermedia;
pub mod models;
pub mod schemas;
pub mod templates_structs;
