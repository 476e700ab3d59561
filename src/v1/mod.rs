//! Access to cgroup v1 hierarchies.
//!
//! [`Hierarchy`] is the call-based interface the query engine and the attach operation are built
//! on: enumerating controllers, walking a group tree, enumerating the tasks of a group, reading a
//! process's live membership, and moving a process into a group. [`Cgroupfs`] implements it over
//! a mounted cgroup v1 file system and `/proc`.
//!
//! In cgroup v1, a system has multiple directory hierarchies. One or more controllers are
//! attached to each hierarchy, and a hierarchy is identified by its mount point. For more
//! information, see the kernel's documentation [Documentation/cgroup-v1/cgroups.txt].
//!
//! [`Hierarchy`]: trait.Hierarchy.html
//! [`Cgroupfs`]: struct.Cgroupfs.html
//! [Documentation/cgroup-v1/cgroups.txt]: https://www.kernel.org/doc/Documentation/cgroup-v1/cgroups.txt

use std::path::PathBuf;

use crate::{Pid, Result};

mod cgroupfs;

pub use cgroupfs::Cgroupfs;

#[cfg(test)]
pub(crate) mod fixture;

/// Default location of `/proc`.
pub const PROC_ROOT: &str = "/proc";

/// A controller and the mount point of the hierarchy it is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    /// Controller name, e.g. `cpu`, or `name=systemd` for a named hierarchy.
    pub name: String,
    /// Mount point of the hierarchy.
    pub mount_point: PathBuf,
}

impl Controller {
    /// Creates a new `Controller`.
    pub fn new(name: impl Into<String>, mount_point: PathBuf) -> Self {
        Self {
            name: name.into(),
            mount_point,
        }
    }
}

/// Type of an entry visited by a tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Directory, i.e. a cgroup.
    Dir,
    /// Regular file, i.e. a control file.
    File,
    /// Anything else.
    Other,
}

/// An entry visited by a tree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path of the entry, starting with the hierarchy's mount point.
    pub full_path: PathBuf,
    /// Type of the entry.
    pub file_type: FileType,
    /// Depth relative to the root of the walk. The root has depth 0.
    pub depth: usize,
}

/// One line of `/proc/<pid>/cgroup`: the group a process belongs to in one hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Hierarchy ID.
    pub hierarchy_id: u32,
    /// Controllers attached to the hierarchy.
    pub controllers: Vec<String>,
    /// Group path relative to the hierarchy root, e.g. `/batch`.
    pub path: String,
}

/// Iterator over the entries of a tree walk.
pub type Walk<'a> = Box<dyn Iterator<Item = FileInfo> + 'a>;

/// Iterator over the tasks of a group.
pub type Tasks<'a> = Box<dyn Iterator<Item = Pid> + 'a>;

/// Underlying cgroup hierarchy API.
///
/// Every call reads the live state of the system; nothing is cached between calls. Handles such as
/// a [`Walk`] are local to the caller and are released when dropped.
///
/// [`Walk`]: type.Walk.html
pub trait Hierarchy: Send + Sync {
    /// Enumerates the mounted controllers in mount-table order.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table or the controller list could not be read.
    fn controllers(&self) -> Result<Vec<Controller>>;

    /// Begins a pre-order walk of the group tree rooted at `path` in the hierarchy `controller` is
    /// attached to. The root itself is the first entry. Entries deeper than `depth` are not
    /// visited; `0` means no limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller is not mounted, or the root could not be opened.
    fn walk_tree(&self, controller: &str, path: &str, depth: usize) -> Result<Walk<'_>>;

    /// Begins an enumeration of the tasks in the group at `path` under `controller`.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller is not mounted, or the `tasks` file of the group could
    /// not be read and parsed.
    fn tasks(&self, controller: &str, path: &str) -> Result<Tasks<'_>>;

    /// Reads the live membership of a process in every hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the membership of the process could not be read, e.g. the process no
    /// longer exists.
    fn proc_cgroups(&self, pid: Pid) -> Result<Vec<Membership>>;

    /// Moves a process into the group at `path` under every controller in `controllers`, in one
    /// call. The name `*` stands for every mounted controller.
    ///
    /// # Errors
    ///
    /// Returns an error if a controller is not mounted, the group does not exist under one of the
    /// controllers, the process does not exist, or the kernel refused the move.
    fn change_cgroup_path(&self, path: &str, pid: Pid, controllers: &[&str]) -> Result<()>;
}

impl<T: Hierarchy + ?Sized> Hierarchy for &T {
    fn controllers(&self) -> Result<Vec<Controller>> {
        (**self).controllers()
    }

    fn walk_tree(&self, controller: &str, path: &str, depth: usize) -> Result<Walk<'_>> {
        (**self).walk_tree(controller, path, depth)
    }

    fn tasks(&self, controller: &str, path: &str) -> Result<Tasks<'_>> {
        (**self).tasks(controller, path)
    }

    fn proc_cgroups(&self, pid: Pid) -> Result<Vec<Membership>> {
        (**self).proc_cgroups(pid)
    }

    fn change_cgroup_path(&self, path: &str, pid: Pid, controllers: &[&str]) -> Result<()> {
        (**self).change_cgroup_path(path, pid, controllers)
    }
}
