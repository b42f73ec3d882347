pub mod data;
pub mod fixture;
pub mod server;
