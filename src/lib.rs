//! This module contains the core logic of the secreg security controls registry.
//!
//! It defines the main modules for configuration, storage, and request handling.

pub mod config;
pub mod error;
pub mod handler;
pub mod service;
pub mod store;
