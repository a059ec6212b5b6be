pub mod logger;
pub mod settings;

pub mod provider;
pub mod session;

pub mod application_impl;
pub mod application_port;
pub mod domain_model;
pub mod infra_http;
pub mod infra_ws;
pub mod wire;
