pub mod auth;
pub mod configuration;
pub mod envelope;
pub mod error;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
