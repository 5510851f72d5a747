//! Manage Vertex AI Workbench notebook instances through the Notebooks v2 API.
//!
//! - [`gcp`] - credentials, HTTP transport and per-call sessions
//! - [`notebook`] - instance lifecycle, naming and templates
//! - [`config`] - settings file and gcloud defaults

pub mod config;
pub mod error;
pub mod gcp;
pub mod notebook;

pub use error::{NotebookError, Result};
