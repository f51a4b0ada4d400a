//! On-disk persistence for the capability profile.

use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::profile::CapabilityProfile;

/// Stores a [`CapabilityProfile`] as a small JSON file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location under the user's cache directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("lumenimg").join("capabilities.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the profile from disk.
    pub fn load(&self) -> io::Result<CapabilityProfile> {
        let file = std::fs::File::open(&self.path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to parse capability profile: {}", e),
            )
        })
    }

    /// Load the profile, treating a missing or corrupt file as empty.
    pub fn load_or_default(&self) -> CapabilityProfile {
        match self.load() {
            Ok(profile) => profile,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No usable capability profile");
                CapabilityProfile::default()
            }
        }
    }

    /// Write the profile, replacing any previous one atomically.
    pub fn save(&self, profile: &CapabilityProfile) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let file = std::fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, profile)?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &self.path)
    }
}
