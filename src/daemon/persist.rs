use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to stage playtime totals next to {path:?}")]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to replace {path:?} with staged totals")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path:?}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Owns the on-disk `display_name:total_seconds` file. Every write goes
/// through a temporary file in the same directory followed by an atomic
/// rename, so a reader only ever sees a complete file and a failed write
/// leaves the previous one untouched.
pub struct PlaytimeFile {
    path: PathBuf,
}

impl PlaytimeFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full snapshot. Entries are sorted by name so successive
    /// files diff cleanly.
    pub fn persist(&self, totals: &HashMap<String, f64>) -> Result<(), PersistError> {
        let stage = |source| PersistError::Stage {
            path: self.path.clone(),
            source,
        };

        let dir = self.path.parent().unwrap_or(Path::new("."));
        let mut staged = NamedTempFile::new_in(dir).map_err(stage)?;

        let mut entries = totals.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, seconds) in entries {
            writeln!(staged, "{name}:{seconds}").map_err(stage)?;
        }
        staged.flush().map_err(stage)?;

        staged
            .persist(&self.path)
            .map_err(|e| PersistError::Replace {
                path: self.path.clone(),
                source: e.error,
            })?;
        Ok(())
    }

    /// Reads the persisted totals. A missing file means nothing has been
    /// recorded yet. Names may contain `:`, so the split happens on the last
    /// one; lines that still don't parse are skipped with a warning rather
    /// than discarding the rest of the file.
    pub fn load(&self) -> Result<HashMap<String, f64>, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut totals = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line
                .rsplit_once(':')
                .and_then(|(name, value)| Some((name, value.trim().parse::<f64>().ok()?)))
            {
                Some((name, seconds)) => {
                    totals.insert(name.to_owned(), seconds);
                }
                None => {
                    warn!("Skipping malformed playtime line {line:?} in {:?}", self.path)
                }
            }
        }
        Ok(totals)
    }
}
