pub mod app_env;
pub mod client_context;
pub mod config;
pub mod domain;
pub mod external_connections;
pub mod logging;
pub mod persistence;
pub mod ui;

#[cfg(test)]
mod integration_test;
