pub mod app;
pub mod archive;
pub mod config;
pub mod console;
pub mod domain;
pub mod error;
pub mod server;
pub mod store;
pub mod upstream;
