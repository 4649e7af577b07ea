//! Trellis daemon library
//!
//! This module provides the pieces behind `trellisd`:
//! - Configuration loading
//! - Offline manifest rendering
//! - Controller lifecycle management

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod render;
pub mod server;

pub use config::{DaemonConfig, LoggingConfig};
pub use error::{DaemonError, DaemonResult};
pub use render::{render, RenderRequest};
pub use server::{load_objects, shutdown_signal, Daemon, DeploymentSummary, RunSummary};
