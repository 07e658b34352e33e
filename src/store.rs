use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const STORE_VERSION: u32 = 1;

thread_local! {
    static TEST_DATA_DIR: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_data_dir(path: PathBuf) {
    TEST_DATA_DIR.with(|p| *p.borrow_mut() = Some(path));
}

/// Directory holding schedules and session results.
pub fn data_dir() -> Result<PathBuf> {
    #[cfg(test)]
    {
        if let Some(path) = TEST_DATA_DIR.with(|p| p.borrow().clone()) {
            return Ok(path);
        }
    }

    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".peakform"))
}

#[derive(Serialize, Deserialize)]
struct StoreFile<T> {
    version: u32,
    items: Vec<T>,
}

/// A versioned JSON list persisted to a single file.
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Store named `file_name` inside [`data_dir`].
    pub fn open(file_name: &str) -> Result<Self> {
        Ok(Self::at(data_dir()?.join(file_name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All items, or an empty list when the file does not exist yet.
    pub fn load(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut data = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let file: StoreFile<T> = simd_json::from_slice(&mut data)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        if file.version != STORE_VERSION {
            anyhow::bail!(
                "{} has unsupported version {} (expected {})",
                self.path.display(),
                file.version,
                STORE_VERSION
            );
        }

        Ok(file.items)
    }

    /// Replace the stored list. Writes go through a temp file and rename.
    pub fn save(&self, items: Vec<T>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = StoreFile {
            version: STORE_VERSION,
            items,
        };
        let content = simd_json::to_string_pretty(&file).context("Failed to serialize store")?;

        let temp_path = self.path.with_extension("tmp");
        let mut out = File::create(&temp_path)?;
        out.write_all(content.as_bytes())?;
        out.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    pub fn append(&self, item: T) -> Result<()> {
        let mut items = self.load()?;
        items.push(item);
        self.save(items)
    }
}
