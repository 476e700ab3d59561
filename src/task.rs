//! Tasks of a group across several controllers, and moving a task into a group.

use tracing::debug;

use crate::{
    controller_set::{ControllerSet, WILDCARD},
    hierarchy::Query,
    Error, ErrorKind, Pid,
};

/// Error returned by [`TaskControl::attach_task`].
///
/// [`TaskControl::attach_task`]: trait.TaskControl.html#method.attach_task
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    /// The pid is not a positive integer. No move was attempted.
    #[error("Invalid pid")]
    InvalidPid(#[source] Error),

    /// The hierarchy API refused the move.
    #[error(transparent)]
    Failed(Error),
}

impl AttachError {
    /// Returns the kind of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPid(_) => ErrorKind::InvalidArgument,
            Self::Failed(e) => e.kind(),
        }
    }
}

/// Operations on the tasks of groups.
pub trait TaskControl: Query {
    /// Lists the tasks that are in the group at `path` under every controller in `controllers`.
    ///
    /// Returns an empty list if the group does not exist under every controller. Otherwise, the
    /// tasks of the group under the first controller are the candidates, and a candidate is kept
    /// only if its live membership puts it in `path` under each remaining controller. A candidate
    /// whose membership cannot be read is dropped.
    fn list_tasks(&self, controllers: &ControllerSet, path: &str) -> Vec<Pid> {
        if !self.group_exists_under_set(controllers, path) {
            debug!("group `{}:{}' does not exist", controllers, path);
            return vec![];
        }

        let names = if controllers.is_wildcard() {
            match self.controllers() {
                Ok(known) => controllers.resolve(&known),
                Err(_) => return vec![],
            }
        } else {
            controllers.names().to_vec()
        };

        let (first, others) = match names.split_first() {
            Some(split) => split,
            None => return vec![],
        };

        let tasks = match self.tasks(first, path) {
            Ok(tasks) => tasks,
            Err(e) => {
                debug!("unable to enumerate tasks of `{}:{}': {}", first, path, e);
                return vec![];
            }
        };

        tasks
            .filter(|&pid| others.is_empty() || self.group_has_pid(others, path, pid))
            .collect()
    }

    /// Returns whether the live membership of `pid` puts it in the group at `path` under every
    /// controller in `controllers`.
    fn group_has_pid(&self, controllers: &[String], path: &str, pid: Pid) -> bool {
        let memberships = match self.proc_cgroups(pid) {
            Ok(memberships) => memberships,
            Err(e) => {
                debug!("unable to read membership of pid {}: {}", pid, e);
                return false;
            }
        };

        let in_group: Vec<&str> = memberships
            .iter()
            .filter(|m| m.path == path)
            .flat_map(|m| m.controllers.iter().map(String::as_str))
            .collect();
        debug!("all pid {} controllers `{}'", pid, in_group.join(","));

        let ret = controllers.iter().all(|c| in_group.contains(&c.as_str()));
        debug!(
            "pid {} is{} under `{}' controllers",
            pid,
            if ret { "" } else { " not" },
            controllers.join(",")
        );
        ret
    }

    /// Moves the task `pid` into the group at `path` under every controller in `controllers`,
    /// with a single call to the hierarchy API. No retry is made.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::InvalidPid`] if `pid` is not a positive integer, without calling the
    /// hierarchy API. Returns [`AttachError::Failed`] with the error of the hierarchy API if the
    /// move failed.
    ///
    /// [`AttachError::InvalidPid`]: enum.AttachError.html#variant.InvalidPid
    /// [`AttachError::Failed`]: enum.AttachError.html#variant.Failed
    fn attach_task(
        &self,
        controllers: &ControllerSet,
        path: &str,
        pid: &str,
    ) -> Result<(), AttachError> {
        let pid = pid.parse::<Pid>().map_err(|e| {
            debug!("invalid pid: {}", pid);
            AttachError::InvalidPid(e)
        })?;

        let names: Vec<&str> = if controllers.is_wildcard() {
            vec![WILDCARD]
        } else {
            controllers.names().iter().map(String::as_str).collect()
        };
        for (i, name) in names.iter().enumerate() {
            debug!("controller[{}] = {}", i, name);
        }

        self.change_cgroup_path(path, pid, &names).map_err(|e| {
            debug!("moving {} to `{}' failed: {}", pid, path, e);
            AttachError::Failed(e)
        })
    }
}

impl<T: Query + ?Sized> TaskControl for T {}
