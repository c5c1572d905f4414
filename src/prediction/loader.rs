//! Model loading.
//!
//! `FileModelLoader` reads and parses the model file on every call, so a
//! replaced file is picked up by the next request. `CachedModelLoader` wraps
//! any loader and keeps the first successfully loaded model for the life of
//! the process.

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::model::{Classifier, LogisticModel};
use crate::{metrics, Error, Result};

/// Source of a ready-to-use classifier.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn Classifier>>;
}

/// Loads the serialized model from disk on each call.
#[derive(Debug, Clone)]
pub struct FileModelLoader {
    path: PathBuf,
}

impl FileModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_model(&self) -> Result<LogisticModel> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::ModelLoad(format!("{}: {}", self.path.display(), e)))?;
        LogisticModel::from_json(&content).map_err(|e| match e {
            Error::ModelLoad(msg) => {
                Error::ModelLoad(format!("{}: {}", self.path.display(), msg))
            }
            other => other,
        })
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self) -> Result<Arc<dyn Classifier>> {
        let result = self.read_model();
        metrics::record_model_load(result.is_ok());
        let model = result?;
        debug!(path = %self.path.display(), "Loaded classifier");
        Ok(Arc::new(model))
    }
}

/// Keeps the first successfully loaded model.
pub struct CachedModelLoader<L> {
    inner: L,
    cached: OnceCell<Arc<dyn Classifier>>,
}

impl<L: ModelLoader> CachedModelLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cached: OnceCell::new(),
        }
    }
}

impl<L: ModelLoader> ModelLoader for CachedModelLoader<L> {
    fn load(&self) -> Result<Arc<dyn Classifier>> {
        self.cached
            .get_or_try_init(|| self.inner.load())
            .map(Arc::clone)
    }
}

/// Loader for the configured model path, cached or not.
pub fn loader_for(path: impl Into<PathBuf>, cache: bool) -> Arc<dyn ModelLoader> {
    let file = FileModelLoader::new(path);
    if cache {
        Arc::new(CachedModelLoader::new(file))
    } else {
        Arc::new(file)
    }
}
