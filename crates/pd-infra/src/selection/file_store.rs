use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use pd_core::ports::SelectionStorePort;
use pd_core::selection::{PersistedDestination, SelectionState};
use pd_core::Destination;
use tracing::{debug, warn};

/// JSON file holding the last selection and the recent-destination list.
///
/// Read and write failures are logged; callers always get a usable state.
pub struct FileSelectionStore {
    path: PathBuf,
    max_recent: usize,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>, max_recent: usize) -> Self {
        Self {
            path: path.into(),
            max_recent,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents; a missing file is an empty state.
    pub fn load(&self) -> Result<SelectionState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SelectionState::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read selection state failed: {}", self.path.display()))
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("parse selection state failed: {}", self.path.display()))
    }

    pub fn save(&self, state: &SelectionState) -> Result<()> {
        let content =
            serde_json::to_string_pretty(state).context("serialize selection state failed")?;
        self.atomic_write(&content)
    }

    fn load_or_default(&self) -> SelectionState {
        self.load().unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "selection state unreadable, starting empty");
            SelectionState::default()
        })
    }

    fn atomic_write(&self, content: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create state dir failed: {}", dir.display()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("write temp state failed: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "rename temp state to target failed: {} -> {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

impl SelectionStorePort for FileSelectionStore {
    fn persist_selection(&self, destination: &Destination) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut state = self.load_or_default();
        state.record(destination, self.max_recent);
        match self.save(&state) {
            Ok(()) => debug!(key = %destination.key(), "selection persisted"),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to persist selection"),
        }
    }

    fn load_persisted_selection(&self) -> Option<PersistedDestination> {
        self.load_or_default().selected
    }

    fn load_recent_destinations(&self) -> Vec<PersistedDestination> {
        self.load_or_default().recent
    }
}
