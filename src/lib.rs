//! Magnetcast - live segment feeds over content-addressed swarms
//!
//! The publisher turns a live playlist into a feed of content identifiers;
//! the consumer follows that feed and rebuilds the stream in order.

pub mod config;
pub mod consumer;
pub mod publisher;
pub mod server;
pub mod watch;
