//! Tests for the sandbox console extension
//!
//! These spin up a JavaScript runtime with the extension installed and drive
//! the guest `console` from scripts.

mod runtime_integration;
