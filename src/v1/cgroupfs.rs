use std::{
    fs::{self, File},
    io::Read,
    path::{Component, Path, PathBuf},
};

use tracing::debug;
use walkdir::WalkDir;

use crate::{
    controller_set::WILDCARD,
    parse,
    v1::{Controller, FileInfo, FileType, Hierarchy, Membership, Tasks, Walk, PROC_ROOT},
    Error, ErrorKind, Pid, Result,
};

const CGROUPS: &str = "cgroups";
const MOUNTS: &str = "self/mounts";
const CGROUP: &str = "cgroup";
const TASKS: &str = "tasks";

const FS_TYPE: &str = "cgroup";
const NAMED_PREFIX: &str = "name=";

/// [`Hierarchy`] over mounted cgroup v1 file systems.
///
/// Controllers are discovered from `/proc/cgroups` and `/proc/self/mounts`, group trees are read
/// from the mounted directories, and the membership of a process from `/proc/<pid>/cgroup`. A
/// process is moved by writing its ID to the `tasks` file of the target group.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> cgroups_rest::Result<()> {
/// use cgroups_rest::v1::{Cgroupfs, Hierarchy};
///
/// let fs = Cgroupfs::new()?;
/// for controller in fs.controllers()? {
///     println!("{} is mounted on {}", controller.name, controller.mount_point.display());
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`Hierarchy`]: trait.Hierarchy.html
#[derive(Debug, Clone)]
pub struct Cgroupfs {
    proc_root: PathBuf,
}

impl Cgroupfs {
    /// Opens the cgroup file systems of this host.
    ///
    /// # Errors
    ///
    /// Returns an error if `/proc/cgroups` could not be read and parsed, e.g. the kernel was built
    /// without cgroup support.
    pub fn new() -> Result<Self> {
        Self::with_proc_root(PROC_ROOT)
    }

    /// Opens the cgroup file systems described by a proc file system mounted at `proc_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `<proc_root>/cgroups` could not be read and parsed.
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Result<Self> {
        let fs = Self {
            proc_root: proc_root.into(),
        };
        let subsystems = fs.subsystems()?;
        debug!(
            "{} enabled subsystems in {}",
            subsystems.len(),
            fs.proc_root.display()
        );
        Ok(fs)
    }

    /// Returns the root of the proc file system this handler reads.
    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    fn subsystems(&self) -> Result<Vec<String>> {
        let file = File::open(self.proc_root.join(CGROUPS))?;
        parse_subsystems(file)
    }

    fn mount_point(&self, controller: &str) -> Result<PathBuf> {
        self.controllers()?
            .into_iter()
            .find(|c| c.name == controller)
            .map(|c| c.mount_point)
            .ok_or_else(|| Error::with_context(ErrorKind::NotMounted, controller))
    }
}

impl Hierarchy for Cgroupfs {
    fn controllers(&self) -> Result<Vec<Controller>> {
        let subsystems = self.subsystems()?;
        let mut mounts = String::new();
        File::open(self.proc_root.join(MOUNTS))?.read_to_string(&mut mounts)?;
        Ok(parse_mounts(&mounts, &subsystems))
    }

    fn walk_tree(&self, controller: &str, path: &str, depth: usize) -> Result<Walk<'_>> {
        let root = group_dir(&self.mount_point(controller)?, path)?;
        fs::symlink_metadata(&root)?;

        let mut walker = WalkDir::new(&root).sort_by_file_name();
        if depth > 0 {
            walker = walker.max_depth(depth);
        }

        Ok(Box::new(walker.into_iter().map_while(|entry| {
            let entry = entry.ok()?;
            let file_type = if entry.file_type().is_dir() {
                FileType::Dir
            } else if entry.file_type().is_file() {
                FileType::File
            } else {
                FileType::Other
            };
            Some(FileInfo {
                depth: entry.depth(),
                full_path: entry.into_path(),
                file_type,
            })
        })))
    }

    fn tasks(&self, controller: &str, path: &str) -> Result<Tasks<'_>> {
        let dir = group_dir(&self.mount_point(controller)?, path)?;
        let ids = parse::parse_lines::<u32, _>(File::open(dir.join(TASKS))?)?;
        Ok(Box::new(ids.into_iter().map(Pid::from)))
    }

    fn proc_cgroups(&self, pid: Pid) -> Result<Vec<Membership>> {
        let path = self.proc_root.join(pid.to_string()).join(CGROUP);
        debug!("reading `{}'", path.display());
        File::open(path)
            .map_err(Error::io)
            .and_then(parse_memberships)
    }

    fn change_cgroup_path(&self, path: &str, pid: Pid, controllers: &[&str]) -> Result<()> {
        if controllers.is_empty() {
            bail_invalid!("no controllers given");
        }

        let known = self.controllers()?;
        let mut targets = Vec::new();
        for &name in controllers {
            if name == WILDCARD {
                targets.extend(known.iter());
                continue;
            }
            match known.iter().find(|c| c.name == name) {
                Some(c) => targets.push(c),
                None => return Err(Error::with_context(ErrorKind::NotMounted, name)),
            }
        }

        // Co-mounted controllers share one directory, which takes one write.
        let mut dirs: Vec<PathBuf> = Vec::new();
        for controller in targets {
            let dir = group_dir(&controller.mount_point, path)?;
            if !dir.is_dir() {
                return Err(Error::with_context(
                    ErrorKind::NotFound,
                    format!("{}:{}", controller.name, path),
                ));
            }
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }

        if !self.proc_root.join(pid.to_string()).exists() {
            return Err(Error::with_context(
                ErrorKind::NoSuchProcess,
                pid.to_string(),
            ));
        }

        for dir in &dirs {
            debug!("writing {} to `{}'", pid, dir.join(TASKS).display());
            add_task(dir, pid)?;
        }

        Ok(())
    }
}

/// Directory of the group at `path`, relative to a hierarchy mounted at `mount_point`.
fn group_dir(mount_point: &Path, path: &str) -> Result<PathBuf> {
    let rel = Path::new(path.trim_start_matches('/'));
    if rel.components().any(|c| c == Component::ParentDir) {
        bail_invalid!("group path must not contain `..`: {}", path);
    }

    if rel.as_os_str().is_empty() {
        Ok(mount_point.to_path_buf())
    } else {
        Ok(mount_point.join(rel))
    }
}

fn add_task(dir: &Path, pid: Pid) -> Result<()> {
    use std::io::Write;

    // One write(2) per ID; the kernel parses each write on its own.
    let mut file = fs::OpenOptions::new().append(true).open(dir.join(TASKS))?;
    file.write_all(format!("{}\n", pid).as_bytes())
        .map_err(Error::io)
}

/// Names of the enabled subsystems listed in `/proc/cgroups`, in listed order.
fn parse_subsystems<R: Read>(mut reader: R) -> Result<Vec<String>> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;

    let mut names = Vec::new();
    for line in buf.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let name = match fields.next() {
            Some(name) => name,
            None => continue,
        };
        // hierarchy ID and number of cgroups
        let _: u32 = parse::parse_next(&mut fields)?;
        let _: u32 = parse::parse_next(&mut fields)?;
        let enabled: u32 = parse::parse_next(&mut fields)?;

        if enabled == 1 {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Controllers of the cgroup v1 mounts in a mount table, in mount order. Within a mount,
/// subsystems come in `subsystems` order, followed by the hierarchy name if any. A controller
/// mounted more than once keeps its first mount point.
fn parse_mounts(mounts: &str, subsystems: &[String]) -> Vec<Controller> {
    let mut controllers: Vec<Controller> = Vec::new();

    for line in mounts.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[2] != FS_TYPE {
            continue;
        }

        let mount_point = PathBuf::from(parse::unescape_octal(fields[1]));
        let options: Vec<&str> = fields[3].split(',').collect();

        let names = subsystems
            .iter()
            .map(String::as_str)
            .filter(|s| options.contains(s))
            .chain(
                options
                    .iter()
                    .copied()
                    .filter(|o| o.starts_with(NAMED_PREFIX)),
            );

        for name in names {
            if controllers.iter().any(|c| c.name == name) {
                continue;
            }
            controllers.push(Controller::new(name, mount_point.clone()));
        }
    }

    controllers
}

fn parse_memberships<R: Read>(mut reader: R) -> Result<Vec<Membership>> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;

    let mut memberships = Vec::new();
    for line in buf.lines() {
        let mut fields = line.splitn(3, ':');
        let (id, controllers, path) = match (fields.next(), fields.next(), fields.next()) {
            (Some(id), Some(controllers), Some(path)) => (id, controllers, path.trim_end()),
            _ => {
                debug!("skipping malformed line `{}'", line);
                continue;
            }
        };

        let hierarchy_id = match id.parse::<u32>() {
            Ok(id) => id,
            Err(_) => {
                debug!("skipping malformed line `{}'", line);
                continue;
            }
        };
        if controllers.is_empty() || path.is_empty() {
            continue;
        }

        memberships.push(Membership {
            hierarchy_id,
            controllers: controllers.split(',').map(String::from).collect(),
            path: path.to_string(),
        });
    }

    Ok(memberships)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1::fixture::Fixture;

    const PROC_CGROUPS: &str = "\
#subsys_name\thierarchy\tnum_cgroups\tenabled
cpuset\t2\t1\t1
cpu\t3\t64\t1
cpuacct\t3\t64\t1
memory\t4\t80\t1
devices\t5\t70\t1
rdma\t0\t1\t0
";

    const PROC_MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /sys/fs/cgroup tmpfs ro,nosuid,nodev,noexec,mode=755 0 0
cgroup2 /sys/fs/cgroup/unified cgroup2 rw,nosuid,nodev,noexec,relatime 0 0
cgroup /sys/fs/cgroup/systemd cgroup rw,nosuid,nodev,noexec,relatime,xattr,name=systemd 0 0
cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,nosuid,nodev,noexec,relatime,cpuacct,cpu 0 0
cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,nodev,noexec,relatime,memory 0 0
cgroup /mnt/second\\040memory cgroup rw,relatime,memory 0 0
cgroup /sys/fs/cgroup/cpuset cgroup rw,nosuid,nodev,noexec,relatime,cpuset 0 0
";

    #[test]
    fn test_parse_subsystems() -> Result<()> {
        assert_eq!(
            parse_subsystems(PROC_CGROUPS.as_bytes())?,
            vec!["cpuset", "cpu", "cpuacct", "memory", "devices"]
        );
        assert_eq!(
            parse_subsystems("cpu 3 x 1\n".as_bytes())
                .unwrap_err()
                .kind(),
            ErrorKind::Parse
        );
        Ok(())
    }

    #[test]
    fn test_parse_mounts() -> Result<()> {
        let subsystems = parse_subsystems(PROC_CGROUPS.as_bytes())?;
        let controllers = parse_mounts(PROC_MOUNTS, &subsystems);

        let cpu_cpuacct = PathBuf::from("/sys/fs/cgroup/cpu,cpuacct");
        assert_eq!(
            controllers,
            vec![
                Controller::new("name=systemd", PathBuf::from("/sys/fs/cgroup/systemd")),
                Controller::new("cpu", cpu_cpuacct.clone()),
                Controller::new("cpuacct", cpu_cpuacct),
                Controller::new("memory", PathBuf::from("/sys/fs/cgroup/memory")),
                Controller::new("cpuset", PathBuf::from("/sys/fs/cgroup/cpuset")),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_parse_mounts_escaped() {
        let subsystems = vec!["memory".to_string()];
        let controllers = parse_mounts(
            "cgroup /mnt/my\\040memory cgroup rw,memory 0 0\n",
            &subsystems,
        );
        assert_eq!(
            controllers,
            vec![Controller::new("memory", PathBuf::from("/mnt/my memory"))]
        );
    }

    #[test]
    fn test_parse_memberships() -> Result<()> {
        let content = "\
12:pids:/user.slice/user-1000.slice
4:cpu,cpuacct:/batch
3:name=systemd:/user.slice
0::/user.slice
garbage
x:memory:/
";
        let memberships = parse_memberships(content.as_bytes())?;
        assert_eq!(
            memberships,
            vec![
                Membership {
                    hierarchy_id: 12,
                    controllers: vec!["pids".to_string()],
                    path: "/user.slice/user-1000.slice".to_string(),
                },
                Membership {
                    hierarchy_id: 4,
                    controllers: vec!["cpu".to_string(), "cpuacct".to_string()],
                    path: "/batch".to_string(),
                },
                Membership {
                    hierarchy_id: 3,
                    controllers: vec!["name=systemd".to_string()],
                    path: "/user.slice".to_string(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_group_dir() -> Result<()> {
        let mount = Path::new("/sys/fs/cgroup/memory");
        assert_eq!(group_dir(mount, "/")?, mount);
        assert_eq!(group_dir(mount, "")?, mount);
        assert_eq!(group_dir(mount, "/batch/low")?, mount.join("batch/low"));
        assert_eq!(group_dir(mount, "batch")?, mount.join("batch"));
        assert_eq!(
            group_dir(mount, "/batch/../../../etc")
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );
        Ok(())
    }

    #[test]
    fn test_cgroupfs_controllers() -> Result<()> {
        let fx = Fixture::new(&["cpu", "cpuacct", "memory"]);
        let cpu = fx.mount(&["cpu", "cpuacct"]);
        let memory = fx.mount(&["memory"]);

        let fs = fx.cgroupfs();
        assert_eq!(
            fs.controllers()?,
            vec![
                Controller::new("cpu", cpu.clone()),
                Controller::new("cpuacct", cpu),
                Controller::new("memory", memory),
            ]
        );
        Ok(())
    }

    #[test]
    fn err_cgroupfs_init() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Cgroupfs::with_proc_root(dir.path()).unwrap_err().kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_cgroupfs_walk_tree() -> Result<()> {
        let fx = Fixture::new(&["memory"]);
        let memory = fx.mount(&["memory"]);
        fx.group(&memory, "/batch");
        fx.group(&memory, "/batch/low");
        fx.group(&memory, "/batch/low/deep");
        fx.group(&memory, "/web");

        let fs = fx.cgroupfs();
        let dirs = |path: &str, depth: usize| -> Result<Vec<(PathBuf, usize)>> {
            Ok(fs
                .walk_tree("memory", path, depth)?
                .filter(|i| i.file_type == FileType::Dir)
                .map(|i| (i.full_path, i.depth))
                .collect())
        };

        assert_eq!(
            dirs("/batch", 0)?,
            vec![
                (memory.join("batch"), 0),
                (memory.join("batch/low"), 1),
                (memory.join("batch/low/deep"), 2),
            ]
        );
        assert_eq!(
            dirs("/batch", 1)?,
            vec![(memory.join("batch"), 0), (memory.join("batch/low"), 1)]
        );
        assert_eq!(dirs("/", 1)?.len(), 3);

        // control files are visited too
        let first_file = fs
            .walk_tree("memory", "/web", 0)?
            .find(|i| i.file_type == FileType::File)
            .map(|i| i.full_path);
        assert_eq!(first_file, Some(memory.join("web/tasks")));

        Ok(())
    }

    #[test]
    fn err_cgroupfs_walk_tree() {
        let fx = Fixture::new(&["memory"]);
        let memory = fx.mount(&["memory"]);
        fx.group(&memory, "/batch");
        let fs = fx.cgroupfs();

        assert_eq!(
            fs.walk_tree("memory", "/nope", 0).err().map(|e| e.kind()),
            Some(ErrorKind::Io)
        );
        assert_eq!(
            fs.walk_tree("blkio", "/batch", 0).err().map(|e| e.kind()),
            Some(ErrorKind::NotMounted)
        );
    }

    #[test]
    fn test_cgroupfs_tasks() -> Result<()> {
        let fx = Fixture::new(&["cpu"]);
        let cpu = fx.mount(&["cpu"]);
        fx.group(&cpu, "/batch");
        fx.set_tasks(&cpu, "/batch", &[10, 20, 30]);

        let fs = fx.cgroupfs();
        assert_eq!(
            fs.tasks("cpu", "/batch")?.collect::<Vec<_>>(),
            vec![Pid::from(10), Pid::from(20), Pid::from(30)]
        );
        assert_eq!(
            fs.tasks("cpu", "/missing").err().map(|e| e.kind()),
            Some(ErrorKind::Io)
        );
        Ok(())
    }

    #[test]
    fn test_cgroupfs_proc_cgroups() -> Result<()> {
        let fx = Fixture::new(&["cpu", "memory"]);
        fx.process(42, &[(3, "cpu", "/batch"), (4, "memory", "/")]);

        let fs = fx.cgroupfs();
        let memberships = fs.proc_cgroups(Pid::from(42))?;
        assert_eq!(memberships.len(), 2);
        assert_eq!(memberships[0].path, "/batch");

        assert_eq!(
            fs.proc_cgroups(Pid::from(43)).unwrap_err().kind(),
            ErrorKind::Io
        );
        Ok(())
    }

    #[test]
    fn test_cgroupfs_change_cgroup_path() -> Result<()> {
        let fx = Fixture::new(&["cpu", "cpuacct", "memory"]);
        let cpu = fx.mount(&["cpu", "cpuacct"]);
        let memory = fx.mount(&["memory"]);
        fx.group(&cpu, "/batch");
        fx.group(&memory, "/batch");
        fx.process(4242, &[]);

        let fs = fx.cgroupfs();
        fs.change_cgroup_path("/batch", Pid::from(4242), &["cpu", "cpuacct", "memory"])?;

        // one write for the co-mounted pair
        assert_eq!(fx.tasks(&cpu, "/batch"), vec![4242]);
        assert_eq!(fx.tasks(&memory, "/batch"), vec![4242]);
        Ok(())
    }

    #[test]
    fn test_cgroupfs_change_cgroup_path_wildcard() -> Result<()> {
        let fx = Fixture::new(&["cpu", "memory"]);
        let cpu = fx.mount(&["cpu"]);
        let memory = fx.mount(&["memory"]);
        fx.process(7, &[]);

        let fs = fx.cgroupfs();
        fs.change_cgroup_path("/", Pid::from(7), &["*"])?;

        assert_eq!(fx.tasks(&cpu, "/"), vec![7]);
        assert_eq!(fx.tasks(&memory, "/"), vec![7]);
        Ok(())
    }

    #[test]
    fn err_cgroupfs_change_cgroup_path() {
        let fx = Fixture::new(&["cpu", "memory"]);
        let cpu = fx.mount(&["cpu"]);
        let memory = fx.mount(&["memory"]);
        fx.group(&cpu, "/batch");
        fx.process(7, &[]);

        let fs = fx.cgroupfs();
        let kind = |path: &str, pid: u32, controllers: &[&str]| {
            fs.change_cgroup_path(path, Pid::from(pid), controllers)
                .unwrap_err()
                .kind()
        };

        assert_eq!(kind("/batch", 7, &["cpu", "blkio"]), ErrorKind::NotMounted);
        assert_eq!(kind("/batch", 7, &["cpu", "memory"]), ErrorKind::NotFound);
        assert_eq!(kind("/batch", 8, &["cpu"]), ErrorKind::NoSuchProcess);
        assert_eq!(kind("/batch", 7, &[]), ErrorKind::InvalidArgument);

        // nothing was written on failure
        assert!(fx.tasks(&cpu, "/batch").is_empty());
        assert!(fx.tasks(&memory, "/").is_empty());
    }
}
