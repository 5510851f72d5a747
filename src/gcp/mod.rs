//! GCP API interaction module
//!
//! Authentication, HTTP transport and session management for the Notebooks API.
//!
//! # Module Structure
//!
//! - [`auth`] - Service account keys, Application Default Credentials and bearer tokens
//! - [`client`] - Client factory and per-call sessions
//! - [`http`] - HTTP utilities and Google error envelope parsing
//!
//! # Example
//!
//! ```ignore
//! use nbctl::gcp::auth::CredentialSource;
//! use nbctl::gcp::client::{ClientConfig, ClientFactory};
//!
//! async fn example() -> nbctl::Result<()> {
//!     let factory = ClientFactory::new(ClientConfig::new(CredentialSource::ApplicationDefault));
//!     let session = factory.open("my-project", "us-central1-a").await?;
//!     let page = session.get("projects/my-project/locations/us-central1-a/instances").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
