//! Record of already published bundle identifiers
//!
//! The ledger is a flat JSON array of bundle identifiers. It is read once at
//! the start of a run and rewritten after every successful publish, so a
//! crash mid-run never loses entries that already completed.
//!
//! # Examples
//!
//! ```no_run
//! use altpub::Ledger;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ledger = Ledger::load("uploaded_apps.json")?;
//! if !ledger.contains("com.example.app") {
//!     ledger.insert("com.example.app");
//!     ledger.save()?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// The ledger filename used when nothing else is configured
pub const LEDGER_NAME: &str = "uploaded_apps.json";

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl Ledger {
    /// An empty ledger that will be saved to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ids: BTreeSet::new(),
        }
    }

    /// Load the ledger from disk
    ///
    /// A missing or empty file yields an empty ledger. A corrupt file is
    /// deleted and replaced by an empty ledger; only IO errors on reading an
    /// existing file are returned.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut ledger = Self::new(path);

        if !path.exists() {
            return Ok(ledger);
        }

        let content = fs::read(path)?;
        match parse_ids(&content) {
            Ok(ids) => ledger.ids = ids,
            Err(e) => {
                eprintln!("  ⚠ {}", e);
                eprintln!("    Starting with an empty ledger.");
                if let Err(e) = fs::remove_file(path) {
                    eprintln!("    Could not remove {}: {}", path.display(), e);
                }
            }
        }

        Ok(ledger)
    }

    /// Rewrite the whole file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let ids: Vec<&String> = self.ids.iter().collect();
        fs::write(&self.path, serde_json::to_string_pretty(&ids)?)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, bundle_id: &str) -> bool {
        self.ids.contains(bundle_id)
    }

    /// Returns false if the id was already present
    pub fn insert(&mut self, bundle_id: &str) -> bool {
        self.ids.insert(bundle_id.to_string())
    }

    pub fn remove(&mut self, bundle_id: &str) -> bool {
        self.ids.remove(bundle_id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

fn parse_ids(content: &[u8]) -> Result<BTreeSet<String>> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeSet::new());
    }

    let value: Option<Vec<String>> = serde_json::from_slice(content)
        .map_err(|e| Error::LedgerCorrupt(format!("expected a JSON array of strings ({})", e)))?;

    Ok(value.unwrap_or_default().into_iter().collect())
}
