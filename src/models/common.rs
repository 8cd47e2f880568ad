use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the model weights live while generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
    Remote,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F16,
    F32,
    Remote,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
            Device::Remote => "remote",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::F16 => "f16",
            Precision::F32 => "f32",
            Precision::Remote => "remote",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub backend: String,
    pub device: Device,
    pub precision: Precision,
}
