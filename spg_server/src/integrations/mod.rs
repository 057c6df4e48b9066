//! Adapters between the engine's traits and the outside world.
pub mod gateway;
pub mod realtime;
