/// Command relay: wake broadcast, SSH sleep, liveness probing
pub mod client;
pub mod magic;
pub mod probe;
pub mod shell;
