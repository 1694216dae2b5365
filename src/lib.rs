//! Betcoin Backend Library
//!
//! Exposes core modules for use by the binary and integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod game;
pub mod middleware;
pub mod price;
pub mod storage;
