use metrics_exporter_prometheus::PrometheusHandle;
use practicum::workflows::internships::DocumentFiles;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Uploaded files stored beneath a single root directory.
#[derive(Debug, Clone)]
pub(crate) struct DiskDocumentFiles {
    root: PathBuf,
}

impl DiskDocumentFiles {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentFiles for DiskDocumentFiles {
    fn remove(&self, relative_path: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.root.join(relative_path)) {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
