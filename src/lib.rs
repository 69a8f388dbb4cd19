pub mod config;
pub mod gateway;
pub mod handlers;
pub mod humanize;
pub mod observability;
pub mod repo;
pub mod server;
pub mod task;
pub mod validation;
pub mod worker;
