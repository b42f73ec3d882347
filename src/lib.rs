pub mod cli;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod jsonapi;
pub mod server;
