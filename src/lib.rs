//! Shelly Power Reader Library
//!
//! This library polls a single Shelly smart-plug/meter device for power and
//! energy readings. Gen 1 devices are read over the plain HTTP status API,
//! Gen 2+ devices over JSON-RPC with HTTP Digest authentication (RFC 7616).

pub mod config;
pub mod digest_auth;
pub mod meter;
pub mod poller;
pub mod reader;
pub mod rpc_api_reader;
pub mod status_api_reader;

// Re-export commonly used types for easier access
pub use config::{DeviceEndpoint, Generation};
pub use digest_auth::{parse_challenge, DigestChallenge};
pub use meter::MeterReading;
pub use poller::Poller;
pub use reader::{PowerReader, ReadError, ShellyReader, SHELLY_USER};
pub use rpc_api_reader::RpcApiReader;
pub use status_api_reader::StatusApiReader;
