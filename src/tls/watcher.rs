use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::CertificateError;
use crate::health::HealthState;

/// Symlink a kubelet-projected volume swaps atomically on every update
const PROJECTED_DATA_LINK: &str = "..data";

/// Something that can reload a certificate pair from disk
pub trait CertificateLoader: Send + Sync + 'static {
    fn cert_path(&self) -> &Path;
    fn key_path(&self) -> &Path;
    fn reload(&self) -> Result<(), CertificateError>;
}

/// Whether an event kind may have changed certificate material.
///
/// Opens, reads and access-time updates are ignored; the reload itself
/// produces them.
fn is_relevant(kind: &EventKind) -> bool {
    !matches!(
        kind,
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime))
    )
}

/// Names in the watched directories whose changes trigger a reload
#[derive(Debug)]
struct WatchedNames {
    names: Vec<OsString>,
}

impl WatchedNames {
    fn new(cert: &Path, key: &Path) -> Self {
        let mut names: Vec<OsString> = [cert.file_name(), key.file_name()]
            .into_iter()
            .flatten()
            .map(OsString::from)
            .collect();
        names.push(OsString::from(PROJECTED_DATA_LINK));
        Self { names }
    }

    fn contains(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.names.iter().any(|n| n.as_os_str() == name))
    }

    fn touched_by(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| self.contains(path))
    }
}

/// Directory holding `path`, `.` for a bare file name
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Watch the certificate and key files and reload on change.
///
/// The directories holding the files are watched rather than the files
/// themselves, so a file renamed over the original or a swapped `..data`
/// symlink still triggers a reload after the old inode is gone. Both files
/// must exist and both directories must be watchable before this returns;
/// otherwise the error is reported to the caller. Reload failures are
/// logged and the loop keeps going with the previous certificate. The task
/// ends when `shutdown` is cancelled.
pub fn watch_certificate_files<L: CertificateLoader>(
    loader: Arc<L>,
    shutdown: CancellationToken,
    health: Option<Arc<HealthState>>,
) -> Result<JoinHandle<()>, CertificateError> {
    let files = [loader.cert_path(), loader.key_path()];
    for path in files {
        std::fs::metadata(path).map_err(|e| CertificateError::Watch {
            path: path.to_path_buf(),
            source: notify::Error::io(e).add_path(path.to_path_buf()),
        })?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        // receiver gone means the loop has stopped
        let _ = tx.send(event);
    })
    .map_err(|source| CertificateError::Watch {
        path: loader.cert_path().to_path_buf(),
        source,
    })?;

    let mut dirs: Vec<&Path> = Vec::with_capacity(files.len());
    for path in files {
        let dir = parent_dir(path);
        if dirs.contains(&dir) {
            continue;
        }
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| CertificateError::Watch {
                path: path.to_path_buf(),
                source,
            })?;
        dirs.push(dir);
    }

    let names = WatchedNames::new(loader.cert_path(), loader.key_path());
    info!(
        cert = %loader.cert_path().display(),
        key = %loader.key_path().display(),
        dirs = ?dirs,
        "Starting certificate watcher"
    );

    let handle = tokio::spawn(async move {
        // dropping the watcher unregisters it
        let _watcher: RecommendedWatcher = watcher;

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Certificate watcher stopped");
                    return;
                }
                event = rx.recv() => event,
            };

            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!(error = %e, "Certificate watcher error");
                    continue;
                }
                None => {
                    warn!("Certificate watcher channel closed");
                    return;
                }
            };

            if !is_relevant(&event.kind) || !names.touched_by(&event) {
                debug!(kind = ?event.kind, paths = ?event.paths, "Ignoring certificate directory event");
                continue;
            }

            info!(kind = ?event.kind, paths = ?event.paths, "Detected change in certificate files");
            let result = loader.reload();
            if let Some(health) = &health {
                health.metrics.record_reload(result.is_ok());
            }
            match result {
                Ok(()) => info!("Successfully reloaded certificate"),
                Err(e) => error!(error = %e, "Error reloading certificate"),
            }
        }
    });

    Ok(handle)
}
