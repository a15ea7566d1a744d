//! Process-scoped runtime state shared by every session and buffer.
//!
//! An [`Environment`] must be initialized before any model is loaded and may
//! only be shut down once every session, decoder and buffer created from it
//! is gone. It is passed around explicitly as a handle; there is no global.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::tensor::{TensorBuffer, TensorData};
use crate::{Result, StrandError};

pub const RUNTIME_LIBRARY_ENV: &str = "STRAND_RUNTIME_LIBRARY";

#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    /// Shared library backing the engine runtime, when the engine needs one.
    pub runtime_library: Option<PathBuf>,
}

impl EnvironmentConfig {
    pub fn from_env() -> Self {
        Self {
            runtime_library: std::env::var_os(RUNTIME_LIBRARY_ENV).map(PathBuf::from),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct BufferLedger {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl BufferLedger {
    pub(crate) fn record_allocation(&self) {
        self.allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self) -> BufferStats {
        let allocated = self.allocated.load(Ordering::Relaxed);
        let released = self.released.load(Ordering::Relaxed);
        BufferStats {
            allocated,
            released,
            live: allocated.saturating_sub(released),
        }
    }
}

/// Buffer counters of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub allocated: usize,
    pub released: usize,
    pub live: usize,
}

#[derive(Debug)]
struct EnvInner {
    config: EnvironmentConfig,
    ledger: Arc<BufferLedger>,
}

/// Handle to the engine runtime environment. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

impl Environment {
    pub fn init(config: EnvironmentConfig) -> Result<Self> {
        if let Some(path) = &config.runtime_library {
            if !path.exists() {
                return Err(StrandError::Environment(format!(
                    "runtime library {} does not exist",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "using runtime library");
        }
        info!("environment initialized");
        Ok(Self {
            inner: Arc::new(EnvInner {
                config,
                ledger: Arc::new(BufferLedger::default()),
            }),
        })
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.inner.config
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.inner.ledger.stats()
    }

    /// Zero-filled f32 buffer.
    pub fn allocate_f32(&self, shape: &[usize]) -> Result<TensorBuffer> {
        let numel = shape.iter().product();
        self.from_f32(vec![0.0; numel], shape)
    }

    /// Zero-filled i64 buffer.
    pub fn allocate_i64(&self, shape: &[usize]) -> Result<TensorBuffer> {
        let numel = shape.iter().product();
        self.from_i64(vec![0; numel], shape)
    }

    pub fn from_f32(&self, data: Vec<f32>, shape: &[usize]) -> Result<TensorBuffer> {
        TensorBuffer::new(TensorData::F32(data), shape, Arc::clone(&self.inner.ledger))
    }

    pub fn from_i64(&self, data: Vec<i64>, shape: &[usize]) -> Result<TensorBuffer> {
        TensorBuffer::new(TensorData::I64(data), shape, Arc::clone(&self.inner.ledger))
    }

    /// Tear the environment down.
    ///
    /// Fails while other handles to it exist or any buffer allocated from it
    /// is still live.
    pub fn shutdown(self) -> Result<()> {
        let stats = self.buffer_stats();
        if stats.live > 0 {
            return Err(StrandError::Environment(format!(
                "{} buffers still live at shutdown",
                stats.live
            )));
        }
        match Arc::try_unwrap(self.inner) {
            Ok(_) => {
                info!(
                    allocated = stats.allocated,
                    released = stats.released,
                    "environment shut down"
                );
                Ok(())
            }
            Err(inner) => Err(StrandError::Environment(format!(
                "{} other handles still in use",
                Arc::strong_count(&inner) - 1
            ))),
        }
    }
}
