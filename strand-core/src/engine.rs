//! The seam to the inference engine that executes one forward pass.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::tensor::TensorBuffer;
use crate::{Environment, ModelConfig, Result, StrandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl FromStr for Device {
    type Err = StrandError;

    /// Accepts `""`/`"cpu"`, `"cuda"`, `"cuda:N"`, or a bare ordinal `"N"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse_ordinal = |o: &str| {
            o.parse::<usize>()
                .map_err(|_| StrandError::InvalidInput(format!("invalid device selector '{s}'")))
        };
        match s {
            "" | "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            _ => match s.strip_prefix("cuda:") {
                Some(ordinal) => Ok(Device::Cuda(parse_ordinal(ordinal)?)),
                None => Ok(Device::Cuda(parse_ordinal(s)?)),
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Named inputs and pre-allocated named output slots for one forward pass.
///
/// The binding owns every buffer bound to it. Dropping it releases them all,
/// so an aborted step never leaks.
#[derive(Debug, Default)]
pub struct IoBinding {
    inputs: Vec<(String, TensorBuffer)>,
    outputs: Vec<(String, TensorBuffer)>,
}

impl IoBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_input(&mut self, name: impl Into<String>, buffer: TensorBuffer) {
        self.inputs.push((name.into(), buffer));
    }

    pub fn bind_output(&mut self, name: impl Into<String>, buffer: TensorBuffer) {
        self.outputs.push((name.into(), buffer));
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn input(&self, name: &str) -> Option<&TensorBuffer> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut TensorBuffer> {
        self.outputs.iter_mut().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(n, _)| n.as_str())
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(n, _)| n.as_str())
    }

    /// Release all inputs and hand back the outputs in bind order.
    pub fn into_outputs(self) -> Vec<TensorBuffer> {
        let IoBinding { inputs, outputs } = self;
        drop(inputs);
        outputs.into_iter().map(|(_, b)| b).collect()
    }
}

/// A loaded model ready to execute forward passes.
pub trait Session: Send {
    fn config(&self) -> &ModelConfig;

    fn input_names(&self) -> &[String];

    fn output_names(&self) -> &[String];

    /// Run one forward pass, filling the bound output slots in place.
    fn run(&self, binding: &mut IoBinding) -> Result<()>;
}

/// Loads models into sessions.
pub trait InferenceEngine {
    type Session: Session;

    fn name(&self) -> &str;

    fn load(&self, env: &Environment, model: &Path, device: Device) -> Result<Self::Session>;
}
