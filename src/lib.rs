//! The jgd broker: a persistent NDJSON relay bridging statistical-plotting
//! producers to browser-hosted viewers. This crate wires the lower-level
//! `jgd-protocol`, `jgd-transport`, `jgd-hub`, and `jgd-discovery` crates
//! into a runnable broker process.

pub mod cli;
pub mod http;
pub mod producer_session;
pub mod supervisor;

pub use cli::Config;
pub use supervisor::run;
