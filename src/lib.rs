pub mod cache;
pub mod config;
pub mod engine;
pub mod init;
pub mod logger;
pub mod resolver;
pub mod server;
pub mod stats;
