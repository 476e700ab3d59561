//! Fake proc and cgroup file systems under a temporary directory.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use tempfile::TempDir;

use crate::{
    v1::{Cgroupfs, Controller, Hierarchy, Membership, Tasks, Walk},
    Pid, Result,
};

pub(crate) struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Creates a proc root listing `subsystems` as enabled, with no cgroup mounted yet.
    pub fn new(subsystems: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = dir.path().join("proc");
        fs::create_dir_all(proc_root.join("self")).unwrap();

        let mut cgroups = String::from("#subsys_name\thierarchy\tnum_cgroups\tenabled\n");
        for (i, name) in subsystems.iter().enumerate() {
            cgroups.push_str(&format!("{}\t{}\t1\t1\n", name, i + 1));
        }
        fs::write(proc_root.join("cgroups"), cgroups).unwrap();
        fs::write(
            proc_root.join("self/mounts"),
            "proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0\n",
        )
        .unwrap();

        Self { dir }
    }

    pub fn proc_root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn cgroupfs(&self) -> Cgroupfs {
        Cgroupfs::with_proc_root(self.proc_root()).unwrap()
    }

    /// Mounts a hierarchy with `controllers` attached and returns its mount point.
    pub fn mount(&self, controllers: &[&str]) -> PathBuf {
        let mount_point = self.dir.path().join("cgroup").join(controllers.join(","));
        self.mount_at(&mount_point, &controllers.join(","));
        mount_point
    }

    /// Mounts a named hierarchy without controllers.
    pub fn mount_named(&self, name: &str) -> PathBuf {
        let mount_point = self.dir.path().join("cgroup").join(name);
        self.mount_at(&mount_point, &format!("none,name={}", name));
        mount_point
    }

    fn mount_at(&self, mount_point: &Path, options: &str) {
        fs::create_dir_all(mount_point).unwrap();
        fs::write(mount_point.join("tasks"), "").unwrap();

        let mut mounts = OpenOptions::new()
            .append(true)
            .open(self.proc_root().join("self/mounts"))
            .unwrap();
        writeln!(
            mounts,
            "cgroup {} cgroup rw,nosuid,nodev,noexec,relatime,{} 0 0",
            mount_point.display(),
            options
        )
        .unwrap();
    }

    /// Creates a group with an empty `tasks` file.
    pub fn group(&self, mount_point: &Path, path: &str) -> PathBuf {
        let dir = mount_point.join(path.trim_start_matches('/'));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tasks"), "").unwrap();
        dir
    }

    pub fn set_tasks(&self, mount_point: &Path, path: &str, pids: &[u32]) {
        let content: String = pids.iter().map(|p| format!("{}\n", p)).collect();
        fs::write(
            mount_point.join(path.trim_start_matches('/')).join("tasks"),
            content,
        )
        .unwrap();
    }

    pub fn tasks(&self, mount_point: &Path, path: &str) -> Vec<u32> {
        fs::read_to_string(mount_point.join(path.trim_start_matches('/')).join("tasks"))
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect()
    }

    /// Creates `/proc/<pid>` with the given `(hierarchy ID, controllers, path)` memberships.
    pub fn process(&self, pid: u32, memberships: &[(u32, &str, &str)]) {
        let dir = self.proc_root().join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();

        let content: String = memberships
            .iter()
            .map(|(id, controllers, path)| format!("{}:{}:{}\n", id, controllers, path))
            .collect();
        fs::write(dir.join("cgroup"), content).unwrap();
    }
}

/// Counts the calls made to a hierarchy.
pub(crate) struct Recorder<H> {
    inner: H,
    pub walk_tree: AtomicUsize,
    pub tasks: AtomicUsize,
    pub proc_cgroups: AtomicUsize,
    pub change_cgroup_path: AtomicUsize,
}

impl<H> Recorder<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            walk_tree: AtomicUsize::new(0),
            tasks: AtomicUsize::new(0),
            proc_cgroups: AtomicUsize::new(0),
            change_cgroup_path: AtomicUsize::new(0),
        }
    }
}

impl<H: Hierarchy> Hierarchy for Recorder<H> {
    fn controllers(&self) -> Result<Vec<Controller>> {
        self.inner.controllers()
    }

    fn walk_tree(&self, controller: &str, path: &str, depth: usize) -> Result<Walk<'_>> {
        self.walk_tree.fetch_add(1, Ordering::SeqCst);
        self.inner.walk_tree(controller, path, depth)
    }

    fn tasks(&self, controller: &str, path: &str) -> Result<Tasks<'_>> {
        self.tasks.fetch_add(1, Ordering::SeqCst);
        self.inner.tasks(controller, path)
    }

    fn proc_cgroups(&self, pid: Pid) -> Result<Vec<Membership>> {
        self.proc_cgroups.fetch_add(1, Ordering::SeqCst);
        self.inner.proc_cgroups(pid)
    }

    fn change_cgroup_path(&self, path: &str, pid: Pid, controllers: &[&str]) -> Result<()> {
        self.change_cgroup_path.fetch_add(1, Ordering::SeqCst);
        self.inner.change_cgroup_path(path, pid, controllers)
    }
}
