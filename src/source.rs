use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;

use tracing::{debug, error, trace};

use crate::dashboard::{LoadRequest, LoadResult};
use crate::domain::DashError;
use crate::record::{Record, records_from_payload};

/// Backend record source. `Ok(None)` means the source has no data.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, resource: &str) -> Result<Option<Vec<Record>>, DashError>;
}

/// Serves `<root>/<resource>.json`, e.g. `<root>/api/admin/users.json`.
#[derive(Debug)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, resource: &str) -> Result<PathBuf, DashError> {
        let relative = resource.trim_matches('/');
        if relative.is_empty() || relative.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(DashError::Fetch(format!("invalid resource \"{resource}\"")));
        }
        Ok(self.root.join(format!("{relative}.json")))
    }
}

impl RecordSource for JsonDirSource {
    fn fetch(&self, resource: &str) -> Result<Option<Vec<Record>>, DashError> {
        let path = self.path_for(resource)?;
        trace!("Reading {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DashError::Fetch(format!("{} not found", path.display())),
            ErrorKind::PermissionDenied => {
                DashError::Fetch(format!("permission denied for {}", path.display()))
            }
            _ => DashError::IoError(e),
        })?;
        let payload = serde_json::from_str(&content)?;
        records_from_payload(payload)
    }
}

/// Source used when no backend is configured.
#[derive(Debug, Default)]
pub struct OfflineSource;

impl RecordSource for OfflineSource {
    fn fetch(&self, _resource: &str) -> Result<Option<Vec<Record>>, DashError> {
        Ok(None)
    }
}

/// Runs fetches on the rayon pool and hands results back to the ui loop.
pub struct Loader {
    source: Arc<dyn RecordSource>,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
}

impl Loader {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        let (tx, rx) = channel();
        Self { source, tx, rx }
    }

    pub fn request(&self, request: LoadRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        rayon::spawn(move || {
            let start_time = Instant::now();
            let outcome = source.fetch(request.resource);
            debug!(
                "Fetching {} (ticket {}) took {}ms",
                request.resource,
                request.ticket,
                start_time.elapsed().as_millis()
            );
            if tx.send(LoadResult { request, outcome }).is_err() {
                error!("Ui loop is gone, dropping load result");
            }
        });
    }

    /// Results that arrived since the last call.
    pub fn drain(&self) -> Vec<LoadResult> {
        self.rx.try_iter().collect()
    }

    #[cfg(test)]
    fn wait(&self, timeout: std::time::Duration) -> Option<LoadResult> {
        self.rx.recv_timeout(timeout).ok()
    }
}
