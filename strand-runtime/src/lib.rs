//! Strand runtime: step execution, sampling, and the decode loop.

pub mod decode;
pub mod executor;
pub mod sampling;

pub use decode::Decoder;
pub use executor::{StepExecutor, StepOutput};
pub use sampling::{Greedy, PolicyConfig, Sampler, SamplerConfig, Stochastic};
