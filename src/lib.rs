#![cfg(target_os = "linux")]
#![warn(missing_docs)]

//! Querying cgroup hierarchies and moving tasks between groups, over a small HTTP interface.
//!
//! Currently this crate supports only cgroup v1 hierarchy, implemented in [`v1`](v1/index.html)
//! module. The server answers request URIs of the form
//! `<prefix>cgroups/<controllers>:<path>?<action>`, where `<action>` is `list`, `list-tasks`, or
//! `attach-task=<pid>`. See [`router`](router/index.html) for the details.
//!
//! ## Examples
//!
//! ### List the hierarchies a group exists in
//!
//! ```no_run
//! # fn main() -> cgroups_rest::Result<()> {
//! use cgroups_rest::{v1::Cgroupfs, ControllerSet, Query};
//!
//! let fs = Cgroupfs::new()?;
//! let controllers: ControllerSet = "cpu,memory".parse().unwrap();
//! for hierarchy in fs.list_hierarchies(&controllers, "/") {
//!     println!(
//!         "{}: {} ({} groups)",
//!         hierarchy.mount_point.display(),
//!         hierarchy.controllers.join(","),
//!         hierarchy.groups.len()
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Move a task into a group
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cgroups_rest::{v1::Cgroupfs, ControllerSet, TaskControl};
//!
//! let fs = Cgroupfs::new()?;
//! let controllers = ControllerSet::parse_spec("cpu,memory");
//! let pid = std::process::id().to_string();
//! fs.attach_task(&controllers, "/batch", &pid)?;
//!
//! assert!(fs
//!     .list_tasks(&controllers, "/batch")
//!     .contains(&pid.parse()?));
//! # Ok(())
//! # }
//! ```
//!
//! ### Answer request URIs
//!
//! ```no_run
//! # fn main() -> cgroups_rest::Result<()> {
//! use cgroups_rest::{response::Format, router::Dispatcher, v1::Cgroupfs};
//!
//! let dispatcher = Dispatcher::new(Cgroupfs::new()?, "/", Format::Compat);
//! assert_eq!(dispatcher.dispatch("/").as_deref(), Some("{}"));
//! println!("{:?}", dispatcher.dispatch("/cgroups/cpu:/?list-tasks"));
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;
mod error;
mod parse;
mod types;

pub mod config;
pub mod controller_set;
pub mod hierarchy;
pub mod response;
pub mod router;
pub mod server;
pub mod task;
pub mod v1;

pub use controller_set::ControllerSet;
pub use error::{Error, ErrorKind, Result};
pub use hierarchy::{HierarchyInfo, Query};
pub use task::{AttachError, TaskControl};
pub use types::Pid;
