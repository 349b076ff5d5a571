//! Async client for the configuration registry HTTP API.

mod client;

pub use client::*;
