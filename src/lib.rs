/// Wolbridge - remote power control for a single LAN target
///
/// Two services share this library: the public-facing portal, which
/// authenticates an operator with challenge-response credentials (or a
/// trusted-network bypass) and forwards commands, and the LAN-side relay,
/// which broadcasts Wake-on-LAN magic packets and puts the target to sleep
/// over SSH.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod relay;
pub mod server;
