//! Mapping request URIs to queries, and queries to response bodies.
//!
//! A request URI has the form `<prefix>cgroups/<controllers>:<path>?<action>`:
//!
//! * `<controllers>` is a controller specification, e.g. `cpu,memory`. Without `:`, every
//!   controller is requested.
//! * `<path>` is a group path. Trailing `/` are trimmed unless the path is the root.
//! * `<action>` is `list` (the default), `list-tasks`, or `attach-task=<pid>`.

use tracing::debug;

use crate::{
    controller_set::{ControllerSet, WILDCARD},
    hierarchy::{HierarchyInfo, Query},
    response::{Format, Value},
    task::TaskControl,
    v1::Hierarchy,
};

const CGROUPS: &str = "cgroups";

/// A request, as mapped from its URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// The URI does not start with the URI prefix.
    BadPrefix,
    /// The URI names no resource kind.
    Empty,
    /// A request on cgroups.
    Cgroups(CgroupsRequest),
    /// The URI names an unknown resource kind.
    Unknown(&'a str),
}

/// A request on cgroups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupsRequest {
    /// Controllers the request applies to.
    pub controllers: ControllerSet,
    /// Normalized group path.
    pub path: String,
    /// What to do.
    pub action: Action,
}

/// What a request on cgroups asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// List the hierarchies the group exists in.
    List,
    /// List the tasks of the group.
    ListTasks,
    /// Move a task into the group. `None` if no argument was given.
    AttachTask(Option<String>),
    /// Anything else. No body is written.
    Unrecognized(String),
}

impl Action {
    fn parse(action: &str) -> Self {
        let (name, arg) = match action.split_once('=') {
            Some((name, arg)) => (name, Some(arg)),
            None => (action, None),
        };
        debug!("action `{}', argument `{}'", name, arg.unwrap_or("(null)"));

        match name {
            "" | "list" => Action::List,
            "list-tasks" => Action::ListTasks,
            "attach-task" => Action::AttachTask(arg.map(String::from)),
            _ => Action::Unrecognized(name.to_string()),
        }
    }
}

/// Maps `uri` to a route. `uri` must start with `prefix`.
pub fn route<'a>(uri: &'a str, prefix: &str) -> Route<'a> {
    debug!("request uri = `{}'", uri);

    let uri = match uri.strip_prefix(prefix) {
        Some(uri) => uri,
        None => return Route::BadPrefix,
    };
    debug!("stripped uri = `{}'", uri);

    let uri = uri.trim_start_matches('/');
    let (kind, tail) = match uri.split_once('/') {
        Some((kind, tail)) => (kind, tail),
        None => (uri, ""),
    };
    debug!("resource kind = `{}'", kind);

    match kind {
        "" => Route::Empty,
        CGROUPS => Route::Cgroups(parse_cgroups(tail)),
        _ => {
            debug!("unknown request: `{}'", kind);
            Route::Unknown(kind)
        }
    }
}

fn parse_cgroups(tail: &str) -> CgroupsRequest {
    let tail = tail.trim_start_matches('/');
    let (spec, rest) = match tail.split_once(':') {
        Some((spec, rest)) => (spec, rest),
        None => (WILDCARD, tail),
    };
    let (path, action) = match rest.split_once('?') {
        Some((path, action)) => (path, action),
        None => (rest, ""),
    };
    let path = normalize_path(path);
    debug!(
        "controllers `{}', path `{}', action `{}'",
        spec, path, action
    );

    CgroupsRequest {
        controllers: ControllerSet::parse_spec(spec),
        path,
        action: Action::parse(action),
    }
}

/// Trims trailing `/` unless the path is the root, and makes the path absolute.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Answers request URIs with the bodies produced by a [`Hierarchy`].
///
/// [`Hierarchy`]: ../v1/trait.Hierarchy.html
#[derive(Debug)]
pub struct Dispatcher<H> {
    hierarchy: H,
    uri_prefix: String,
    format: Format,
}

impl<H: Hierarchy> Dispatcher<H> {
    /// Creates a new `Dispatcher` for URIs starting with `uri_prefix`.
    pub fn new(hierarchy: H, uri_prefix: impl Into<String>, format: Format) -> Self {
        Self {
            hierarchy,
            uri_prefix: uri_prefix.into(),
            format,
        }
    }

    /// Returns the hierarchy requests are answered from.
    pub fn hierarchy(&self) -> &H {
        &self.hierarchy
    }

    /// Returns the body for `uri`, or `None` if the request asks for nothing this server knows.
    pub fn dispatch(&self, uri: &str) -> Option<String> {
        let body = match route(uri, &self.uri_prefix) {
            Route::BadPrefix => Value::error(format!(
                "Request must start with {}",
                self.uri_prefix
            )),
            Route::Empty => Value::empty_object(),
            Route::Unknown(kind) => Value::error(format!("Unknown request: {}", kind)),
            Route::Cgroups(req) => self.cgroups(&req)?,
        };
        Some(body.render(self.format))
    }

    fn cgroups(&self, req: &CgroupsRequest) -> Option<Value> {
        let value = match &req.action {
            Action::List => Value::array(
                self.hierarchy
                    .list_hierarchies(&req.controllers, &req.path)
                    .into_iter()
                    .map(hierarchy_value),
            ),
            Action::ListTasks => Value::array(
                self.hierarchy
                    .list_tasks(&req.controllers, &req.path)
                    .into_iter()
                    .map(|pid| Value::Number(u32::from(pid).into())),
            ),
            Action::AttachTask(pid) => {
                match self
                    .hierarchy
                    .attach_task(&req.controllers, &req.path, pid.as_deref().unwrap_or(""))
                {
                    Ok(()) => Value::empty_object(),
                    Err(e) => Value::error(e),
                }
            }
            Action::Unrecognized(name) => {
                debug!("unrecognized action `{}'", name);
                return None;
            }
        };
        Some(value)
    }
}

fn hierarchy_value(info: HierarchyInfo) -> Value {
    Value::object(vec![
        ("controllers", Value::strings(info.controllers)),
        ("groups", Value::strings(info.groups)),
    ])
}
