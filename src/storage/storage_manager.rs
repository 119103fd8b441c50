use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Owns the output directory of a run.
pub struct StorageManager {
    root: PathBuf,
}

impl StorageManager {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create output directory: {}", root.display()))?;
        Ok(StorageManager {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn write_text(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(file_name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("✅ Wrote {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", file_name))?;
        self.write_text(file_name, &json)
    }

    pub fn write_csv(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.path_for(file_name);
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .with_context(|| format!("Failed to write CSV {}", path.display()))?;
        info!("✅ Wrote {} ({} rows)", path.display(), df.height());
        Ok(path)
    }
}
