//! Notebook instance management
//!
//! # Architecture
//!
//! - [`names`] - Resource names and parent paths
//! - [`template`] - Desired-state body for created instances
//! - [`lifecycle`] - List/create/start/stop/delete and access URLs
//! - [`instance`] - Read projections of remote instances
//! - [`operation`] - Operation handles and the optional completion poller
//!
//! # Example
//!
//! ```ignore
//! use nbctl::notebook::{NotebookService, TemplateConfig};
//!
//! async fn create(service: &NotebookService) -> nbctl::Result<()> {
//!     let handle = service.create_instance("my-project", "us-central1-a", "nb-1").await?;
//!     println!("submitted {}", handle);
//!     Ok(())
//! }
//! ```

pub mod instance;
pub mod lifecycle;
pub mod names;
pub mod operation;
pub mod template;

pub use instance::{Instance, InstanceSummary};
pub use lifecycle::NotebookService;
pub use names::{instance_name, parent_path, ResourceName};
pub use operation::{Operation, OperationHandle, OperationPoller, WaitConfig};
pub use template::{InstanceTemplate, TemplateConfig};
