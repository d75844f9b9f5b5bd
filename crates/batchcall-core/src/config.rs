//! Processor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::execute::{CmdProcessor, PoolProcessor, SyncProcessor, ThreadProcessor};

/// Which processor runs batch calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Inline on the submitting thread.
    Sync,
    /// One thread per call.
    #[default]
    Thread,
    /// Shared bounded pool.
    Pool,
}

impl std::str::FromStr for ProcessorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "thread" => Ok(Self::Thread),
            "pool" => Ok(Self::Pool),
            other => Err(Error::Config(format!(
                "unknown processor '{other}' (expected sync, thread or pool)"
            ))),
        }
    }
}

/// Configuration for building a [`CmdProcessor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Processor to build.
    pub kind: ProcessorKind,
    /// Worker count for [`ProcessorKind::Pool`].
    pub pool_threads: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            kind: ProcessorKind::default(),
            pool_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            thread_name_prefix: "batchcall".to_string(),
        }
    }
}

impl ProcessorConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Build the configured processor.
    pub fn build(&self) -> Result<Box<dyn CmdProcessor>> {
        tracing::debug!("building {:?} processor", self.kind);
        Ok(match self.kind {
            ProcessorKind::Sync => Box::new(SyncProcessor::new()),
            ProcessorKind::Thread => Box::new(ThreadProcessor::new(&self.thread_name_prefix)),
            ProcessorKind::Pool => Box::new(PoolProcessor::new(
                self.pool_threads,
                &self.thread_name_prefix,
            )?),
        })
    }
}
