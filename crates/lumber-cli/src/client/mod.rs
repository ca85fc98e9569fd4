//! Driver side of `lmc`: configuration, the RPC facade and the load drivers
//! built on top of it.

pub mod command;
pub mod config;
pub mod facade;
pub mod flood;
pub mod payload;
pub mod pool;
pub mod streaming;
pub mod telemetry;

#[cfg(test)]
pub mod testing;
