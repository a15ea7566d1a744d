//! Strand core types, traits, and error definitions.

pub mod engine;
pub mod environment;
pub mod error;
pub mod model;
pub mod sampling;
pub mod tensor;
pub mod types;

pub use engine::{Device, InferenceEngine, IoBinding, Session};
pub use environment::{BufferStats, Environment, EnvironmentConfig};
pub use error::{Result, StrandError};
pub use model::CausalLm;
pub use sampling::{Candidate, SampleResult, SelectionPolicy};
pub use tensor::TensorBuffer;
pub use types::*;
