//! Neurgenesis Gateway - HTTP controls and WebSocket snapshots for the renderer

pub mod error;
pub mod report;
pub mod server;
pub mod ws;

pub use server::{router, start_gateway, GatewayState};
