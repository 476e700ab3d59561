//! Serving requests from a fixed pool of worker threads.
//!
//! Every worker shares one [`Listener`]. Accepting is serialized by a lock that is held only around
//! [`Listener::accept`], which hands out a raw connection. Reading the request from the
//! connection and handling it run with no lock held, so a slow client occupies one worker only.
//!
//! [`Listener`]: trait.Listener.html
//! [`Listener::accept`]: trait.Listener.html#tymethod.accept

use std::{
    io,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use tracing::{debug, error, warn};

pub mod http;

pub use http::HttpListener;

/// A source of requests.
pub trait Listener: Sync {
    /// Connection type returned by `accept`.
    type Connection;

    /// Request type read from a connection.
    type Request: Request;

    /// Blocks until the next connection arrives. Called with the accept lock held.
    ///
    /// # Errors
    ///
    /// An error is fatal to the worker that called `accept`.
    fn accept(&self) -> io::Result<Self::Connection>;

    /// Reads a request from `connection`. Called with no lock held.
    ///
    /// Returns `None` if the connection carried no request to handle; the listener has already
    /// answered or dropped it.
    fn read_request(&self, connection: Self::Connection) -> Option<Self::Request>;
}

/// An accepted request.
pub trait Request {
    /// Returns the request URI.
    fn uri(&self) -> &str;

    /// Appends `body` to the response body.
    fn write_body(&mut self, body: &str) -> io::Result<()>;

    /// Sends the response and releases the request.
    fn finish(self) -> io::Result<()>;
}

/// A fixed number of worker threads serving one listener.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Creates a pool of `workers` threads.
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// Returns the number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Serves requests from `listener` until every worker has exited.
    ///
    /// `handler` maps a request URI to a response body; `None` leaves the body empty. A worker
    /// exits when `accept` fails. A worker panic is logged and does not stop its siblings.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool has no workers, or a worker could not be spawned. In the
    /// latter case the workers spawned so far keep running detached; the caller is expected to
    /// exit.
    pub fn run<L, F>(&self, listener: L, handler: F) -> io::Result<()>
    where
        L: Listener + Send + 'static,
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        if self.workers == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker pool has no workers",
            ));
        }

        let listener = Arc::new(listener);
        let lock = Arc::new(Mutex::new(()));
        let handler = Arc::new(handler);
        let handles = spawn_workers(self.workers, |id| {
            let listener = Arc::clone(&listener);
            let lock = Arc::clone(&lock);
            let handler = Arc::clone(&handler);
            thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || work(id, &*listener, &lock, &*handler))
        })?;
        debug!("{} workers running", handles.len());

        for (id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!("worker {} panicked", id);
            }
        }
        Ok(())
    }
}

/// Spawns `workers` threads with `spawn`, retrying while the OS reports `WouldBlock`. Any other
/// error stops spawning and is returned.
fn spawn_workers<S>(workers: usize, mut spawn: S) -> io::Result<Vec<JoinHandle<()>>>
where
    S: FnMut(usize) -> io::Result<JoinHandle<()>>,
{
    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let handle = loop {
            match spawn(id) {
                Ok(handle) => break handle,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    warn!("spawning worker {}: {}, retrying", id, e);
                    thread::yield_now();
                }
                Err(e) => {
                    error!("unable to spawn worker {}: {}", id, e);
                    return Err(e);
                }
            }
        };
        handles.push(handle);
    }
    Ok(handles)
}

fn work<L, F>(id: usize, listener: &L, lock: &Mutex<()>, handler: &F)
where
    L: Listener,
    F: Fn(&str) -> Option<String>,
{
    debug!("worker {} started", id);
    loop {
        let connection = {
            let _guard = match lock.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    error!("worker {}: accept lock poisoned", id);
                    return;
                }
            };
            match listener.accept() {
                Ok(connection) => connection,
                Err(e) => {
                    error!("worker {}: accept failed: {}", id, e);
                    return;
                }
            }
        };
        debug!("worker {} accepted connection", id);

        if let Some(request) = listener.read_request(connection) {
            serve(id, request, handler);
        }
    }
}

fn serve<R, F>(id: usize, mut request: R, handler: &F)
where
    R: Request,
    F: Fn(&str) -> Option<String>,
{
    let body = handler(request.uri());
    if let Some(body) = body {
        if let Err(e) = request.write_body(&body) {
            warn!("worker {}: unable to write response: {}", id, e);
        }
    }
    if let Err(e) = request.finish() {
        warn!("worker {}: unable to finish request: {}", id, e);
    }
}
