//! Session directory layout
//!
//! A session directory holds everything one harvest needs to resume:
//!
//! ```text
//! <session>/
//!   targets.txt  mirrors.txt  proxies.txt
//!   state_index.csv  state_download.csv  (+ .journal)
//!   log.txt
//!   data/<host>[:<port>]/<path>
//! ```

use crate::state::Phase;
use crate::HttpeatError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const TARGETS_FILE: &str = "targets.txt";
pub const MIRRORS_FILE: &str = "mirrors.txt";
pub const PROXIES_FILE: &str = "proxies.txt";
pub const LOG_FILE: &str = "log.txt";
pub const DATA_DIR: &str = "data";

/// An opened session directory
#[derive(Debug, Clone)]
pub struct Session {
    dir: PathBuf,
}

impl Session {
    /// Creates a new session in `dir`
    ///
    /// The directory may already exist (for instance holding only the log
    /// file), but must not contain ledgers from an earlier session.
    pub fn create(dir: &Path) -> Result<Self, HttpeatError> {
        let session = Self {
            dir: dir.to_path_buf(),
        };

        for phase in [Phase::Index, Phase::Download] {
            if session.ledger_path(phase).exists() {
                return Err(HttpeatError::Session(format!(
                    "session already exists in {}, resume it instead",
                    dir.display()
                )));
            }
        }

        create_dir(&session.data_dir())?;
        tracing::info!("Created session in {}", dir.display());
        Ok(session)
    }

    /// Reopens an existing session in `dir`
    pub fn open(dir: &Path) -> Result<Self, HttpeatError> {
        let session = Self {
            dir: dir.to_path_buf(),
        };

        if !session.ledger_path(Phase::Download).exists() {
            return Err(HttpeatError::Session(format!(
                "no session to resume in {}",
                dir.display()
            )));
        }

        create_dir(&session.data_dir())?;
        tracing::info!("Resuming session in {}", dir.display());
        Ok(session)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.join(DATA_DIR)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn ledger_path(&self, phase: Phase) -> PathBuf {
        self.dir.join(phase.ledger_file_name())
    }

    /// Merges `entries` into one of the session's list files
    ///
    /// Entries already present are kept in place; new ones are appended in
    /// the given order. The merged list is written back and returned.
    ///
    /// # Arguments
    ///
    /// * `file_name` - One of [`TARGETS_FILE`], [`MIRRORS_FILE`], [`PROXIES_FILE`]
    /// * `entries` - Entries supplied for this run
    pub fn merge_list(
        &self,
        file_name: &str,
        entries: &[String],
    ) -> Result<Vec<String>, HttpeatError> {
        let path = self.dir.join(file_name);
        let mut merged = match fs::read_to_string(&path) {
            Ok(content) => parse_list(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(HttpeatError::Io { path, source }),
        };

        let before = merged.len();
        for entry in entries {
            let entry = entry.trim();
            if !entry.is_empty() && !merged.iter().any(|m| m == entry) {
                merged.push(entry.to_string());
            }
        }

        if merged.len() != before || !path.exists() {
            let mut content = merged.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            fs::write(&path, content).map_err(|source| HttpeatError::Io {
                path: path.clone(),
                source,
            })?;
        }

        Ok(merged)
    }
}

/// Parses a list file: one entry per line, blank lines and `#` comments ignored
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn create_dir(path: &Path) -> Result<(), HttpeatError> {
    fs::create_dir_all(path).map_err(|source| HttpeatError::Io {
        path: path.to_path_buf(),
        source,
    })
}
