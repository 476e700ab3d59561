use std::{error::Error as StdError, fmt};

/// Result type returned from this crate.
pub type Result<T> = std::result::Result<T, Error>;

type Source = Box<dyn StdError + Sync + Send + 'static>;

/// Error type that can be returned from this crate, in the [`Result::Err`] variant. The lower-level
/// source of this error can be obtained via `source()` method.
///
/// The `Display` output is the message for the error kind, followed by the source when present.
/// This string is what a client sees in the `error` field of a failed request.
///
/// [`Result::Err`]: https://doc.rust-lang.org/std/result/enum.Result.html#variant.Err
#[derive(Debug, thiserror::Error)]
#[error("{kind}{}", fmt_source(.source))]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<Source>,
}

/// Kinds of errors that can occur while querying or modifying cgroup hierarchies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to do an I/O operation on a cgroup file system or on `/proc`.
    Io,

    /// Failed to parse contents of a cgroup or `/proc` file into a value.
    Parse,

    /// A request carried a malformed value, e.g. a pid that is not a positive integer.
    InvalidArgument,

    /// The named controller is not mounted in any hierarchy.
    NotMounted,

    /// The requested cgroup does not exist in a hierarchy.
    NotFound,

    /// The process does not exist.
    NoSuchProcess,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Io => "unable to do an I/O operation on a cgroup file system",
            Self::Parse => "unable to parse contents of a cgroup file",
            Self::InvalidArgument => "invalid argument",
            Self::NotMounted => "controller is not mounted",
            Self::NotFound => "requested group does not exist",
            Self::NoSuchProcess => "no such process",
        })
    }
}

fn fmt_source(source: &Option<Source>) -> String {
    match source {
        Some(source) => format!(": {}", source),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source<E>(kind: ErrorKind, source: E) -> Self
    where
        E: StdError + Sync + Send + 'static,
    {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// An error with a plain message as its source, e.g. the offending controller name.
    pub(crate) fn with_context(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            source: Some(context.into().into()),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn io<E>(source: E) -> Self
    where
        E: StdError + Sync + Send + 'static,
    {
        Self::with_source(ErrorKind::Io, source)
    }

    pub(crate) fn parse<E>(source: E) -> Self
    where
        E: StdError + Sync + Send + 'static,
    {
        Self::with_source(ErrorKind::Parse, source)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io(e)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Self::parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::new(ErrorKind::NotFound).to_string(),
            "requested group does not exist"
        );
        assert_eq!(
            Error::with_context(ErrorKind::NotMounted, "blkio").to_string(),
            "controller is not mounted: blkio"
        );

        let io = std::io::Error::from_raw_os_error(3);
        let err = Error::io(io);
        assert!(err.to_string().starts_with(
            "unable to do an I/O operation on a cgroup file system: "
        ));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_kind() {
        let err: Error = "x".parse::<u32>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "x").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
