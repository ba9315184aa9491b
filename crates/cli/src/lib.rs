//! Build-time tooling for the WiFi login portal.
//!
//! Turns the organization YAML documents into the JSON artifacts and asset
//! directories the server loads at startup.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assets;
pub mod commands;
pub mod pipeline;
