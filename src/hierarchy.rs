//! Queries over the forest of cgroup hierarchies.
//!
//! [`Query`] is implemented for every [`Hierarchy`]. Each query enumerates the live state afresh;
//! failing to begin a walk under a controller counts as "no such entry", so the queries return
//! empty results instead of errors.
//!
//! [`Query`]: trait.Query.html
//! [`Hierarchy`]: ../v1/trait.Hierarchy.html

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    controller_set::ControllerSet,
    v1::{Controller, FileType, Hierarchy},
};

/// A hierarchy as reported to clients: the controllers attached to one mount point, and the
/// groups found under the requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyInfo {
    /// Mount point of the hierarchy.
    pub mount_point: PathBuf,
    /// Every controller attached to the mount point, in enumeration order.
    pub controllers: Vec<String>,
    /// Groups under the requested path, including the path itself, relative to the mount point.
    pub groups: Vec<String>,
}

/// Queries on cgroup hierarchies.
pub trait Query: Hierarchy {
    /// Lists the hierarchies `path` exists in, restricted to controllers in `controllers`.
    ///
    /// Controllers are visited in enumeration order. A hierarchy is reported for the first
    /// enumerated controller on its mount point that is a member of `controllers` and has a group
    /// at `path`. Later controllers on the same mount point are skipped, so each mount point is
    /// reported at most once.
    fn list_hierarchies(&self, controllers: &ControllerSet, path: &str) -> Vec<HierarchyInfo> {
        debug!("controllers `{}', path `{}'", controllers, path);

        let known = match self.controllers() {
            Ok(known) => known,
            Err(e) => {
                debug!("unable to enumerate controllers: {}", e);
                return vec![];
            }
        };

        let mut hierarchies: Vec<HierarchyInfo> = Vec::new();
        for controller in &known {
            debug!(
                "controller `{}', mount point `{}'",
                controller.name,
                controller.mount_point.display()
            );

            if !controllers.is_member(&controller.name)
                || !self.group_has_controller(&controller.name, path)
            {
                continue;
            }
            if hierarchies
                .iter()
                .any(|h| h.mount_point.as_os_str() == controller.mount_point.as_os_str())
            {
                continue;
            }

            hierarchies.push(HierarchyInfo {
                mount_point: controller.mount_point.clone(),
                controllers: self.list_controllers_by_mount_point(&controller.mount_point),
                groups: self.list_groups(&controller.name, path, &controller.mount_point),
            });
        }

        hierarchies
    }

    /// Lists every controller attached to the hierarchy mounted at `mount_point`, in enumeration
    /// order.
    fn list_controllers_by_mount_point(&self, mount_point: &Path) -> Vec<String> {
        match self.controllers() {
            Ok(known) => controllers_by_mount_point(&known, mount_point),
            Err(e) => {
                debug!("unable to enumerate controllers: {}", e);
                vec![]
            }
        }
    }

    /// Lists the groups in the tree rooted at `path` in the hierarchy `controller` is attached
    /// to, in walk order. Each group is given relative to `mount_point`, starting with `/`.
    fn list_groups(&self, controller: &str, path: &str, mount_point: &Path) -> Vec<String> {
        let walk = match self.walk_tree(controller, path, 0) {
            Ok(walk) => walk,
            Err(e) => {
                debug!("unable to walk `{}:{}': {}", controller, path, e);
                return vec![];
            }
        };

        walk.filter(|info| info.file_type == FileType::Dir)
            .map(|info| {
                let rel = relative_group(&info.full_path, mount_point);
                debug!("full path = `{}', rel path = `{}'", info.full_path.display(), rel);
                rel
            })
            .collect()
    }

    /// Returns whether a group exists at `path` under `controller`.
    fn group_has_controller(&self, controller: &str, path: &str) -> bool {
        match self.walk_tree(controller, path, 0) {
            Ok(mut walk) => walk
                .next()
                .map_or(false, |root| root.file_type == FileType::Dir),
            Err(_) => false,
        }
    }

    /// Returns whether a group exists at `path` under every controller in `controllers`. The
    /// wildcard stands for every enumerated controller.
    fn group_exists_under_set(&self, controllers: &ControllerSet, path: &str) -> bool {
        let names = if controllers.is_wildcard() {
            match self.controllers() {
                Ok(known) => controllers.resolve(&known),
                Err(_) => return false,
            }
        } else {
            controllers.names().to_vec()
        };

        names.iter().all(|name| {
            debug!("controller `{}'", name);
            self.group_has_controller(name, path)
        })
    }
}

impl<T: Hierarchy + ?Sized> Query for T {}

fn controllers_by_mount_point(known: &[Controller], mount_point: &Path) -> Vec<String> {
    known
        .iter()
        .filter(|c| c.mount_point.as_os_str() == mount_point.as_os_str())
        .map(|c| c.name.clone())
        .collect()
}

/// `full_path` relative to `mount_point`, with exactly one leading `/`.
fn relative_group(full_path: &Path, mount_point: &Path) -> String {
    let rel = full_path.strip_prefix(mount_point).unwrap_or(full_path);
    format!("/{}", rel.to_string_lossy().trim_start_matches('/'))
}
