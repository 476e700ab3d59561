//! A minimal HTTP/1.x [`Listener`] over TCP or a Unix domain socket.
//!
//! Request heads are parsed with `httparse`. Only the request target is used; headers are
//! discarded, and every response is sent with `Connection: close`.
//!
//! [`Listener`]: ../trait.Listener.html

use std::{
    fmt,
    fs,
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    os::{
        fd::{AsRawFd, OwnedFd},
        unix::net::{UnixListener, UnixStream},
    },
    path::{Path, PathBuf},
    time::Duration,
};

use nix::sys::socket::{
    bind, listen, setsockopt, socket, sockopt, AddressFamily, Backlog, SockFlag, SockType,
    SockaddrIn, SockaddrIn6, UnixAddr,
};
use tracing::{debug, warn};

use super::{Listener, Request};
use crate::{config::SocketSpec, response::CONTENT_TYPE};

const MAX_HEAD: usize = 16 * 1024;
const MAX_HEADERS: usize = 64;

/// Read timeout of an accepted connection unless set with [`HttpListener::with_read_timeout`].
///
/// [`HttpListener::with_read_timeout`]: struct.HttpListener.html#method.with_read_timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Listens for HTTP requests.
#[derive(Debug)]
pub struct HttpListener {
    inner: Inner,
    read_timeout: Option<Duration>,
}

#[derive(Debug)]
enum Inner {
    Tcp(TcpListener),
    Unix(UnixListener, PathBuf),
}

impl HttpListener {
    /// Binds to `socket` and starts listening with a queue of `backlog` pending connections.
    ///
    /// A stale file at a Unix socket path is removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the address could not be resolved, or the socket could not be bound.
    pub fn bind(socket: &SocketSpec, backlog: u32) -> io::Result<Self> {
        let backlog = i32::try_from(backlog)
            .ok()
            .and_then(|n| Backlog::new(n).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("listen backlog out of range: {}", backlog),
                )
            })?;

        let inner = match socket {
            SocketSpec::Tcp { host, port } => {
                let addr = (host.as_str(), *port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::AddrNotAvailable,
                            format!("no address for {}", host),
                        )
                    })?;
                Inner::Tcp(bind_tcp(addr, backlog)?)
            }
            SocketSpec::Unix(path) => Inner::Unix(bind_unix(path, backlog)?, path.clone()),
        };
        Ok(Self {
            inner,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        })
    }

    /// Sets how long reading a request head may block between two reads. `None` waits forever.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Returns the local address of a TCP listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            Inner::Tcp(listener) => listener.local_addr().ok(),
            Inner::Unix(..) => None,
        }
    }
}

impl Drop for HttpListener {
    fn drop(&mut self) {
        if let Inner::Unix(_, path) = &self.inner {
            let _ = fs::remove_file(path);
        }
    }
}

fn bind_tcp(addr: SocketAddr, backlog: Backlog) -> io::Result<TcpListener> {
    let family = match addr {
        SocketAddr::V4(_) => AddressFamily::Inet,
        SocketAddr::V6(_) => AddressFamily::Inet6,
    };
    let fd: OwnedFd = socket(family, SockType::Stream, SockFlag::SOCK_CLOEXEC, None)?;
    setsockopt(&fd, sockopt::ReuseAddr, &true)?;
    match addr {
        SocketAddr::V4(addr) => bind(fd.as_raw_fd(), &SockaddrIn::from(addr))?,
        SocketAddr::V6(addr) => bind(fd.as_raw_fd(), &SockaddrIn6::from(addr))?,
    }
    listen(&fd, backlog)?;
    Ok(TcpListener::from(fd))
}

fn bind_unix(path: &Path, backlog: Backlog) -> io::Result<UnixListener> {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed stale socket `{}'", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let fd: OwnedFd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC,
        None,
    )?;
    bind(fd.as_raw_fd(), &UnixAddr::new(path)?)?;
    listen(&fd, backlog)?;
    Ok(UnixListener::from(fd))
}

impl Listener for HttpListener {
    type Connection = Connection;
    type Request = HttpRequest;

    fn accept(&self) -> io::Result<Connection> {
        let stream = match &self.inner {
            Inner::Tcp(listener) => listener.accept().map(|(s, _)| Stream::Tcp(s))?,
            Inner::Unix(listener, _) => listener.accept().map(|(s, _)| Stream::Unix(s))?,
        };
        Ok(Connection { stream })
    }

    /// Reads the request head. A malformed head is answered with `400 Bad Request`. A connection
    /// that closes or stays silent past the read timeout is dropped.
    fn read_request(&self, connection: Connection) -> Option<HttpRequest> {
        let mut stream = connection.stream;
        if let Err(e) = stream.set_read_timeout(self.read_timeout) {
            warn!("unable to set read timeout: {}", e);
            return None;
        }

        match read_head(&mut stream) {
            Ok(Head::Complete(uri)) => Some(HttpRequest {
                uri,
                stream,
                body: Vec::new(),
            }),
            Ok(Head::Invalid(reason)) => {
                warn!("malformed request: {}", reason);
                if let Err(e) = respond(&mut stream, "400 Bad Request", b"") {
                    warn!("unable to reply to malformed request: {}", e);
                }
                None
            }
            // read_head keeps reading past a partial head
            Ok(Head::Partial) => None,
            Err(e) => {
                warn!("unable to read request: {}", e);
                None
            }
        }
    }
}

/// A connection accepted by [`HttpListener`] whose request has not been read yet.
///
/// [`HttpListener`]: struct.HttpListener.html
pub struct Connection {
    stream: Stream,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Head {
    /// A complete head, with its request target.
    Complete(String),
    /// More bytes are needed.
    Partial,
    Invalid(String),
}

/// Reads from `stream` until the buffered bytes hold a complete or invalid head.
fn read_head(stream: &mut Stream) -> io::Result<Head> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0; 1024];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before end of request head",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);

        match parse_head(&buf) {
            Head::Partial if buf.len() < MAX_HEAD => continue,
            Head::Partial => return Ok(Head::Invalid("request head too large".to_string())),
            head => return Ok(head),
        }
    }
}

fn parse_head(buf: &[u8]) -> Head {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);
    match request.parse(buf) {
        Ok(httparse::Status::Complete(_)) => match request.path {
            Some(path) if path.starts_with('/') => Head::Complete(path.to_string()),
            path => Head::Invalid(format!("bad request target `{}'", path.unwrap_or(""))),
        },
        Ok(httparse::Status::Partial) => Head::Partial,
        Err(e) => Head::Invalid(e.to_string()),
    }
}

fn respond(stream: &mut Stream, status: &str, body: &[u8]) -> io::Result<()> {
    write!(
        stream,
        "HTTP/1.0 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        CONTENT_TYPE,
        body.len()
    )?;
    stream.write_all(body)?;
    stream.flush()
}

/// A request accepted by [`HttpListener`].
///
/// [`HttpListener`]: struct.HttpListener.html
pub struct HttpRequest {
    uri: String,
    stream: Stream,
    body: Vec<u8>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("uri", &self.uri)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl Request for HttpRequest {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn write_body(&mut self, body: &str) -> io::Result<()> {
        self.body.extend_from_slice(body.as_bytes());
        Ok(())
    }

    fn finish(mut self) -> io::Result<()> {
        respond(&mut self.stream, "200 OK", &self.body)
    }
}

enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Stream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.set_read_timeout(timeout),
            Stream::Unix(s) => s.set_read_timeout(timeout),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            Stream::Unix(s) => s.flush(),
        }
    }
}
