//! Operator control plane: phase transitions and the HTTP surface that drives them.

mod server;
mod state;

pub use server::{bind, router, serve};
pub use state::{Command, Controller, Transition};
