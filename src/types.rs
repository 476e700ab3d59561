use std::{
    fmt::{self, Display},
    str::FromStr,
};

use crate::{Error, ErrorKind, Result};

/// PID or thread ID of a task in a cgroup.
///
/// `Pid` implements [`FromStr`], which accepts only a positive integer that fits in the kernel's
/// `pid_t`, with no trailing characters. Any other input yields an error with kind
/// [`ErrorKind::InvalidArgument`].
///
/// ```
/// use cgroups_rest::{ErrorKind, Pid};
///
/// assert_eq!("4242".parse::<Pid>().unwrap(), Pid::from(4242));
///
/// for bad in &["0", "-5", "12a", "", "2147483648"] {
///     assert_eq!(bad.parse::<Pid>().unwrap_err().kind(), ErrorKind::InvalidArgument);
/// }
/// ```
///
/// [`FromStr`]: https://doc.rust-lang.org/std/str/trait.FromStr.html
/// [`ErrorKind::InvalidArgument`]: enum.ErrorKind.html#variant.InvalidArgument
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

const PID_MAX: u32 = i32::MAX as u32;

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

impl From<Pid> for u32 {
    fn from(pid: Pid) -> Self {
        pid.0
    }
}

impl FromStr for Pid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<u32>() {
            Ok(n) if n > 0 && n <= PID_MAX => Ok(Self(n)),
            Ok(n) => Err(Error::with_context(
                ErrorKind::InvalidArgument,
                format!("pid out of range: {}", n),
            )),
            Err(e) => Err(Error::with_source(ErrorKind::InvalidArgument, e)),
        }
    }
}

impl Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_from_str() {
        assert_eq!("1".parse::<Pid>().unwrap(), Pid(1));
        assert_eq!("2147483647".parse::<Pid>().unwrap(), Pid(PID_MAX));
    }

    #[test]
    fn err_pid_from_str() {
        for s in &["0", "-5", "12a", " 12", "12 ", "", "4294967296", "2147483648"] {
            assert_eq!(
                s.parse::<Pid>().unwrap_err().kind(),
                ErrorKind::InvalidArgument,
                "{:?}",
                s
            );
        }
    }

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid::from(42).to_string(), "42");
        assert_eq!(u32::from(Pid::from(42)), 42);
    }
}
