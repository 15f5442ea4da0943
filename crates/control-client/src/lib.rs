//! HTTP client for the NuBot control server.
//!
//! The server owns all bot state; this crate only reads it and forwards
//! commands.

pub mod client;
pub mod error;

pub use client::{ControlClient, PollPayload};
pub use error::{ControlError, Result};
