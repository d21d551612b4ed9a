use std::{collections::HashMap, path::{Path, PathBuf}};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// One row of the tracked-programs file.
#[derive(Debug, Deserialize)]
struct RegistryRow {
    exe_name: String,
    proc_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open registry {path:?}")]
    Open {
        path: PathBuf,
        source: csv::Error,
    },
    #[error("invalid row {row} in registry {path:?}")]
    InvalidRow {
        row: usize,
        path: PathBuf,
        source: csv::Error,
    },
    #[error("row {row} in registry {path:?} is missing an exe_name or proc_name")]
    MissingField { row: usize, path: PathBuf },
    #[error("failed to create default registry {path:?}")]
    Seed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Mapping from a normalized executable name to the display name its playtime
/// accumulates under. Loaded once at startup; edits to the file are picked up
/// on the next restart.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, String>,
}

impl Registry {
    /// Reads the `exe_name, proc_name` table at `path`. Any malformed or
    /// incomplete row fails the whole load. Duplicate executables keep the
    /// last row.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| ConfigError::Open {
                path: path.to_owned(),
                source,
            })?;

        let mut entries = HashMap::new();
        for (index, row) in reader.deserialize::<RegistryRow>().enumerate() {
            // Header occupies line 1, so the first record is row 2.
            let row_number = index + 2;
            let row = row.map_err(|source| ConfigError::InvalidRow {
                row: row_number,
                path: path.to_owned(),
                source,
            })?;
            if row.exe_name.is_empty() || row.proc_name.is_empty() {
                return Err(ConfigError::MissingField {
                    row: row_number,
                    path: path.to_owned(),
                });
            }

            let identifier = normalize_identifier(&row.exe_name);
            if let Some(previous) = entries.insert(identifier.clone(), row.proc_name) {
                debug!("Duplicate registry entry for {identifier}, replacing {previous}");
            }
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(exe, name)| (normalize_identifier(&exe), name))
                .collect(),
        }
    }

    pub fn display_name(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(String::as_str)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identifiers are compared against sampled process names, which come back as
/// bare lower-case file names. Entries may be written as full paths in either
/// separator convention.
pub fn normalize_identifier(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim()
        .to_lowercase()
}

/// Seeds a header-only registry so users have a file to fill in. Loading the
/// result yields an empty registry, which is legal.
pub fn ensure_registry_file(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, "exe_name,proc_name\n").map_err(|source| ConfigError::Seed {
        path: path.to_owned(),
        source,
    })
}
