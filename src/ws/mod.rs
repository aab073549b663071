mod client;

pub use client::{WsConnection, connect};
