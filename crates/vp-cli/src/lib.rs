//! Operator CLI for the chunk provenance chain.
//!
//! This library exposes internal CLI modules for testing purposes.

pub mod commands;
pub mod config;
