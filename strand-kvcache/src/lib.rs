//! Strand KV cache: per-layer key/value buffers carried from step to step.

pub mod cache;

pub use cache::{KvCache, LayerKv};
