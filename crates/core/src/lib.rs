//! Redline Core - Shared types library.
//!
//! This crate provides common types used across all Redline Garage components:
//! - `dashboard` - The garage-management web application
//! - `cli` - Command-line tools for configuration checks and menu previews
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - The staff [`Role`](types::Role) enumeration, newtype IDs,
//!   validated emails, theme preferences, and domain status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
