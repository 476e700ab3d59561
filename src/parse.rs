use std::{error::Error as StdErr, io, str::FromStr};

use crate::{Error, Result};

pub fn parse_next<T, I, S>(iter: I) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: StdErr + Sync + Send + 'static,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match iter.into_iter().next() {
        Some(s) => s.as_ref().parse::<T>().map_err(Error::parse),
        None => {
            bail_parse!();
        }
    }
}

/// Parses one value per line, ignoring blank lines.
pub fn parse_lines<T, R>(mut reader: R) -> Result<Vec<T>>
where
    T: FromStr,
    <T as FromStr>::Err: StdErr + Sync + Send + 'static,
    R: io::Read,
{
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;

    buf.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<T>().map_err(Error::parse))
        .collect()
}

/// Decodes the `\ooo` octal escapes the kernel uses for whitespace and backslashes in
/// `/proc/*/mounts` fields.
pub fn unescape_octal(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let n = digits
                    .iter()
                    .fold(0_u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(b) = u8::try_from(n) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
