//! Owned per-layer K/V buffers for a single sequence.
//!
//! A cache is never mutated in place. Each forward pass consumes the current
//! cache and produces a fresh one holding one more position, built from the
//! engine's `present.*` outputs with [`KvCache::from_present`].

use strand_core::{DType, Environment, ModelConfig, Result, StrandError, TensorBuffer};
use tracing::trace;

/// Key and value buffers of one layer, each `[1, heads, positions, head_dim]`.
#[derive(Debug)]
pub struct LayerKv {
    pub key: TensorBuffer,
    pub value: TensorBuffer,
}

#[derive(Debug)]
pub struct KvCache {
    layers: Vec<LayerKv>,
    cached_positions: usize,
}

impl KvCache {
    /// A cache with zero cached positions in every layer.
    pub fn empty(env: &Environment, config: &ModelConfig) -> Result<Self> {
        let shape = config.cache_shape(0);
        let mut layers = Vec::with_capacity(config.num_layers);
        for _ in 0..config.num_layers {
            layers.push(LayerKv {
                key: env.allocate_f32(&shape)?,
                value: env.allocate_f32(&shape)?,
            });
        }
        trace!(num_layers = config.num_layers, "empty kv cache allocated");
        Ok(Self {
            layers,
            cached_positions: 0,
        })
    }

    /// Adopt the engine's present buffers, ordered `key_0, value_0, key_1, ...`.
    ///
    /// Every buffer must be f32 and shaped for `cached_positions` entries. On
    /// error the buffers are released.
    pub fn from_present(
        config: &ModelConfig,
        buffers: Vec<TensorBuffer>,
        cached_positions: usize,
    ) -> Result<Self> {
        if buffers.len() != 2 * config.num_layers {
            return Err(StrandError::ShapeMismatch {
                expected: vec![2 * config.num_layers],
                got: vec![buffers.len()],
            });
        }
        let shape = config.cache_shape(cached_positions);
        for buffer in &buffers {
            if buffer.dtype() != DType::F32 {
                return Err(StrandError::UnsupportedDtype(buffer.dtype()));
            }
            buffer.expect_shape(&shape)?;
        }

        let mut layers = Vec::with_capacity(config.num_layers);
        let mut iter = buffers.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            layers.push(LayerKv { key, value });
        }
        Ok(Self {
            layers,
            cached_positions,
        })
    }

    /// Positions held by every layer.
    pub fn cached_positions(&self) -> usize {
        self.cached_positions
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&LayerKv> {
        self.layers.get(index)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerKv> {
        self.layers.iter()
    }

    pub fn size_bytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.key.size_bytes() + l.value.size_bytes())
            .sum()
    }

    /// Give up the buffers, ordered `key_0, value_0, key_1, ...`.
    pub fn into_buffers(self) -> Vec<TensorBuffer> {
        let mut out = Vec::with_capacity(2 * self.layers.len());
        for LayerKv { key, value } in self.layers {
            out.push(key);
            out.push(value);
        }
        out
    }

    /// Release every buffer of the cache.
    pub fn release(self) {
        trace!(cached_positions = self.cached_positions, "kv cache released");
        drop(self);
    }
}
