//! Network infrastructure: the broadcast server and local-address helpers.

pub mod broadcast_server;
pub mod netinfo;

pub use broadcast_server::{
    BroadcastError, BroadcastServer, ConnectionId, ServerConfig, ServerEvent, StartError,
    StopError,
};
