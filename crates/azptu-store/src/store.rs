//! The state store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::{debug, warn};

use azptu_core::model::{ProjectRef, ProjectSummary};

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::record::{CachedProjects, FieldStatus, PersistedState, Stamped, StateField, STATE_VERSION};

pub const DEFAULT_TTL_SECONDS: u64 = 300;

/// Where the record lives and how long its fields stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub ttl_seconds: u64,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }
}

pub struct StateStore<C = SystemClock> {
    config: StoreConfig,
    clock: C,
    record: PersistedState,
}

impl StateStore<SystemClock> {
    pub fn open(config: StoreConfig) -> Self {
        Self::open_with_clock(config, SystemClock)
    }
}

impl<C: Clock> StateStore<C> {
    /// Load the record at `config.path`. Never fails: anything unreadable is
    /// logged and replaced by an empty record.
    pub fn open_with_clock(config: StoreConfig, clock: C) -> Self {
        let record = load_record(&config.path);
        Self { config, clock, record }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.config.ttl_seconds
    }

    fn now(&self) -> i64 {
        self.clock.now().unix_timestamp()
    }

    fn live<'a, T>(&self, slot: &'a Option<Stamped<T>>) -> Option<&'a T> {
        let now = self.now();
        slot.as_ref()
            .filter(|s| s.is_live(now, self.config.ttl_seconds))
            .map(|s| &s.value)
    }

    pub fn resource_group(&self) -> Option<&str> {
        self.live(&self.record.resource_group).map(String::as_str)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.live(&self.record.subscription_id).map(String::as_str)
    }

    pub fn current_project(&self) -> Option<&ProjectRef> {
        self.live(&self.record.current_project)
    }

    pub fn project_cache(&self) -> Option<&CachedProjects> {
        self.live(&self.record.project_cache)
    }

    /// Cached projects, only when they were listed for `subscription_id`.
    pub fn project_cache_for(&self, subscription_id: &str) -> Option<&[ProjectSummary]> {
        self.project_cache()
            .filter(|c| c.subscription_id == subscription_id)
            .map(|c| c.projects.as_slice())
    }

    pub fn set_resource_group(&mut self, name: impl Into<String>) -> StoreResult<()> {
        self.record.resource_group = Some(Stamped::new(name.into(), self.now()));
        self.save()
    }

    pub fn set_subscription_id(&mut self, id: impl Into<String>) -> StoreResult<()> {
        self.record.subscription_id = Some(Stamped::new(id.into(), self.now()));
        self.save()
    }

    pub fn set_current_project(&mut self, project: ProjectRef) -> StoreResult<()> {
        self.record.current_project = Some(Stamped::new(project, self.now()));
        self.save()
    }

    pub fn set_project_cache(
        &mut self,
        subscription_id: impl Into<String>,
        projects: Vec<ProjectSummary>,
    ) -> StoreResult<()> {
        let cached = CachedProjects {
            subscription_id: subscription_id.into(),
            projects,
        };
        self.record.project_cache = Some(Stamped::new(cached, self.now()));
        self.save()
    }

    /// Whether a read of `field` would see a value, a stale value, or nothing.
    pub fn status(&self, field: StateField) -> FieldStatus {
        match self.record.set_at(field) {
            None => FieldStatus::NotSet,
            Some(set_at) => {
                let stamp = Stamped::new((), set_at);
                if stamp.is_live(self.now(), self.config.ttl_seconds) {
                    FieldStatus::Set
                } else {
                    FieldStatus::Expired
                }
            }
        }
    }

    pub fn is_expired(&self, field: StateField) -> bool {
        self.status(field) == FieldStatus::Expired
    }

    /// When `field` was last written, live or not.
    pub fn set_at(&self, field: StateField) -> Option<OffsetDateTime> {
        self.record
            .set_at(field)
            .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
    }

    /// Seconds until `field` expires; `None` unless it is currently live.
    pub fn remaining_seconds(&self, field: StateField) -> Option<u64> {
        if self.status(field) != FieldStatus::Set {
            return None;
        }
        let set_at = self.record.set_at(field)?;
        let elapsed = u64::try_from(self.now() - set_at).ok()?;
        Some(self.config.ttl_seconds - elapsed)
    }

    /// Remove the record from disk and forget everything in memory.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.record = PersistedState::default();
        match fs::remove_file(&self.config.path) {
            Ok(()) => {
                debug!(path = %self.config.path.display(), "state file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.config.path, e)),
        }
    }

    fn save(&self) -> StoreResult<()> {
        let path = &self.config.path;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, &self.record)?;
        tmp.write_all(b"\n").map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

        debug!(path = %path.display(), "state saved");
        Ok(())
    }
}

fn load_record(path: &Path) -> PersistedState {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return PersistedState::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file unreadable; starting empty");
            return PersistedState::default();
        }
    };

    match serde_json::from_str::<PersistedState>(&raw) {
        Ok(rec) if rec.version == STATE_VERSION => rec,
        Ok(rec) => {
            warn!(path = %path.display(), version = rec.version, "unsupported state version; starting empty");
            PersistedState::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file corrupt; starting empty");
            PersistedState::default()
        }
    }
}
