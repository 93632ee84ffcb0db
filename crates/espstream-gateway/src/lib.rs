//! espstream-gateway: development HTTP surface for the ESPStreamCloud proxy
//!
//! Exposes health, the remembered test users and the open room connections,
//! plus register/login passthroughs that feed the shared session registry.

pub mod routes;
pub mod server;

pub use routes::GatewayState;
pub use server::GatewayServer;
