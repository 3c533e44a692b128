use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Shelly device generation. Determines the protocol a reader speaks:
/// Gen 1 uses the plain HTTP status API, Gen 2+ uses JSON-RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Gen1,
    Gen2Plus,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized shelly generation: {0}, expected one of: 1, 2+")]
pub struct InvalidGeneration(String);

impl FromStr for Generation {
    type Err = InvalidGeneration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Generation::Gen1),
            "2+" => Ok(Generation::Gen2Plus),
            other => Err(InvalidGeneration(other.to_string())),
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Gen1 => write!(f, "1"),
            Generation::Gen2Plus => write!(f, "2+"),
        }
    }
}

/// The single device this process polls. Built once at startup and
/// immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    /// Hostname or IP address of the device.
    pub host: String,
    /// Device password, if one is set. The username is always `admin`.
    pub password: Option<String>,
    pub generation: Generation,
}
