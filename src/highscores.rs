//! Best-score persistence (XDG config or ~/.config/neontris).
//!
//! The game session only ever reads one scalar at construction and writes it
//! back when beaten; the storage medium is this module's business.

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const FILENAME: &str = "best_score";

/// Persistence collaborator consumed by the game session.
pub trait ScoreStore {
    /// Previously recorded best score; 0 when none exists.
    fn load_best(&mut self) -> u32;
    /// Record a new best. Failures are the store's problem, not the game's.
    fn save_best(&mut self, best: u32);
}

/// Returns the path to the best-score file (config dir / neontris / best_score).
fn config_path() -> Result<PathBuf> {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if xdg.is_empty() {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        } else {
            PathBuf::from(xdg)
        }
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    Ok(base.join("neontris").join(FILENAME))
}

/// Disk-backed store. I/O errors degrade to a best of 0 / an unsaved record.
#[derive(Debug)]
pub struct FileScoreStore {
    path: Option<PathBuf>,
}

impl FileScoreStore {
    pub fn new() -> Self {
        Self {
            path: config_path().ok(),
        }
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn write(&self, best: u32) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::File::create(path)?;
        writeln!(f, "{}", best)?;
        Ok(())
    }
}

impl Default for FileScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreStore for FileScoreStore {
    fn load_best(&mut self) -> u32 {
        self.path
            .as_ref()
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    fn save_best(&mut self, best: u32) {
        let _ = self.write(best);
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    best: u32,
}

impl ScoreStore for MemoryScoreStore {
    fn load_best(&mut self) -> u32 {
        self.best
    }

    fn save_best(&mut self, best: u32) {
        self.best = best;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryScoreStore::default();
        assert_eq!(store.load_best(), 0);
        store.save_best(1234);
        assert_eq!(store.load_best(), 1234);
    }

    #[test]
    fn file_store_round_trips_and_tolerates_missing_file() {
        let dir = std::env::temp_dir().join(format!("neontris-test-{}", std::process::id()));
        let path = dir.join(FILENAME);
        let _ = fs::remove_file(&path);

        let mut store = FileScoreStore::at(path.clone());
        assert_eq!(store.load_best(), 0, "missing file reads as 0");
        store.save_best(900);
        assert_eq!(store.load_best(), 900);

        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn garbage_content_reads_as_zero() {
        let dir = std::env::temp_dir().join(format!("neontris-garbage-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let path = dir.join(FILENAME);
        fs::write(&path, "not a number\n").unwrap();

        let mut store = FileScoreStore::at(path.clone());
        assert_eq!(store.load_best(), 0);

        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(&dir);
    }
}
