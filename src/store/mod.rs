//! SQLite-backed ingestion store for uploaded session batches.
//!
//! One worker thread owns the connection and serves typed requests in
//! arrival order, so batches for a session are appended in the order they
//! were received. The async API is a request/reply layer over that thread.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::collector::Collector;
use crate::models::{Session, SessionSummary, UploadBatch};

mod helpers;
mod schema;
mod sessions;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Request {
    Ingest(UploadBatch, Reply<()>),
    List(Reply<Vec<SessionSummary>>),
    Get(String, Reply<Option<Session>>),
    Delete(String, Reply<bool>),
}

impl Request {
    fn serve(self, conn: &mut Connection) {
        match self {
            Request::Ingest(batch, reply) => answer(reply, sessions::ingest(conn, &batch)),
            Request::List(reply) => answer(reply, sessions::summaries(conn)),
            Request::Get(id, reply) => answer(reply, sessions::load(conn, &id)),
            Request::Delete(id, reply) => answer(reply, sessions::remove(conn, &id)),
        }
    }
}

fn answer<T>(reply: Reply<T>, result: Result<T>) {
    if reply.send(result).is_err() {
        warn!("Store caller went away before its reply");
    }
}

/// Owns the worker thread. Closing the request channel ends its loop.
struct Worker {
    requests: Option<mpsc::Sender<Request>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Store worker panicked");
            }
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl SessionStore {
    /// Opens (or creates) the database at `path` and starts its worker.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let worker_path = path.clone();

        let handle = thread::Builder::new()
            .name("sessionreel-store".into())
            .spawn(move || {
                let mut conn = match schema::connect(&worker_path) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                for request in request_rx {
                    request.serve(&mut conn);
                }
                debug!("Store worker for {} exiting", worker_path.display());
            })
            .context("failed to spawn store worker")?;

        ready_rx
            .recv()
            .context("store worker exited during startup")??;
        info!("Session store ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                requests: Some(request_tx),
                handle: Some(handle),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.worker
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("session store is closed"))?
            .send(build(reply_tx))
            .map_err(|_| anyhow!("session store worker has stopped"))?;

        reply_rx
            .await
            .context("session store worker dropped the request")?
    }

    /// Merges one upload batch into its session. The session row is created
    /// on first sight; frames and events are appended in arrival order.
    pub async fn ingest(&self, batch: &UploadBatch) -> Result<()> {
        if batch.session_id.trim().is_empty() {
            bail!("upload batch is missing a session id");
        }
        let batch = batch.clone();
        self.request(|reply| Request::Ingest(batch, reply)).await
    }

    /// Sessions with per-kind counts, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.request(Request::List).await
    }

    /// Full session with frames sorted by timestamp. `None` if unknown.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let id = session_id.to_string();
        self.request(|reply| Request::Get(id, reply)).await
    }

    /// Removes a session together with its frames and events.
    /// Returns false when the session did not exist.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let id = session_id.to_string();
        self.request(|reply| Request::Delete(id, reply)).await
    }
}

#[async_trait]
impl Collector for SessionStore {
    async fn upload(&self, batch: &UploadBatch) -> Result<()> {
        self.ingest(batch).await?;
        debug!(
            "Stored {} frames and {} events for session {}",
            batch.frames.len(),
            batch.event_count(),
            batch.session_id
        );
        Ok(())
    }
}
