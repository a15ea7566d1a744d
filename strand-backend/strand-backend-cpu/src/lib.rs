//! Host-memory reference engine for Strand.

mod engine;

pub use engine::{CpuEngine, CpuSession};
