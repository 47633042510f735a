//! Background file loading.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::bank::read_range;
use crate::error::{Error, Result};

type Callback = Box<dyn FnOnce(Result<Vec<u8>>) + Send>;

struct Request {
    path: PathBuf,
    offset: i64,
    length: i64,
    done: Callback,
}

/// Worker thread reading file regions in request order.
///
/// Each request's callback runs on the worker thread. Requests still queued
/// when the loader is dropped complete with an interrupted error.
pub struct AsyncLoader {
    requests: Option<Sender<Request>>,
    /// Second handle on the request channel, for counting and draining.
    queued: Receiver<Request>,
    thread: Option<JoinHandle<()>>,
}

impl AsyncLoader {
    /// Starts the worker thread.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Request>();
        let worker_rx = rx.clone();
        let thread = std::thread::Builder::new()
            .name("cricket-loader".into())
            .spawn(move || run(&worker_rx))
            .map_err(|e| tracing::error!(error = %e, "failed to start loader thread"))
            .ok();
        Self {
            requests: Some(tx),
            queued: rx,
            thread,
        }
    }

    /// Queues a read of `length` bytes at `offset` (non-positive length: to
    /// the end). Returns false if the worker is not running.
    pub fn load(
        &self,
        path: &Path,
        offset: i64,
        length: i64,
        done: impl FnOnce(Result<Vec<u8>>) + Send + 'static,
    ) -> bool {
        let (Some(tx), Some(_)) = (&self.requests, &self.thread) else {
            return false;
        };
        tx.send(Request {
            path: path.to_path_buf(),
            offset,
            length,
            done: Box::new(done),
        })
        .is_ok()
    }

    /// Requests not yet picked up.
    pub fn pending(&self) -> usize {
        self.queued.len()
    }
}

impl Default for AsyncLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves requests until every sender is gone.
fn run(requests: &Receiver<Request>) {
    for request in requests.iter() {
        tracing::debug!(path = %request.path.display(), "async load");
        let result = read_range(&request.path, request.offset, request.length);
        (request.done)(result);
    }
}

impl Drop for AsyncLoader {
    fn drop(&mut self) {
        let abandoned: Vec<Request> = self.queued.try_iter().collect();
        self.requests.take();
        for req in abandoned {
            let interrupted = std::io::Error::new(std::io::ErrorKind::Interrupted, "loader shut down");
            (req.done)(Err(Error::Io(interrupted)));
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn completes_requests_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();

        let loader = AsyncLoader::new();
        let (tx, rx) = unbounded();
        for (offset, length) in [(0, 2), (2, 0), (9, 0)] {
            let tx = tx.clone();
            assert!(loader.load(&path, offset, length, move |r| {
                tx.send(r.map_err(|e| e.to_string())).unwrap();
            }));
        }

        let wait = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(wait).unwrap(), Ok(vec![1, 2]));
        assert_eq!(rx.recv_timeout(wait).unwrap(), Ok(vec![3, 4, 5]));
        assert!(rx.recv_timeout(wait).unwrap().is_err());
    }

    #[test]
    fn missing_file_reports_error() {
        let loader = AsyncLoader::new();
        let (tx, rx) = unbounded();
        loader.load(Path::new("/nonexistent/bank.ckb"), 0, 0, move |r| {
            tx.send(r.is_ok()).unwrap();
        });
        assert!(!rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn drop_interrupts_queued_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [7u8; 4]).unwrap();

        let loader = AsyncLoader::new();
        let (started_tx, started_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded::<()>();
        loader.load(&path, 0, 0, move |r| {
            started_tx.send(r.is_ok()).unwrap();
            gate_rx.recv().unwrap();
        });
        assert!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap());

        // the worker is parked in the first callback, so this one stays queued
        let (tx, rx) = unbounded();
        loader.load(&path, 0, 0, move |r| {
            tx.send(r.map_err(|e| e.to_string())).unwrap();
            gate_tx.send(()).unwrap();
        });
        assert_eq!(loader.pending(), 1);

        drop(loader);
        let err = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
        assert!(err.contains("loader shut down"), "got: {err}");
    }
}
