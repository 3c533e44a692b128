use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DeviceEndpoint, Generation};
use crate::digest_auth::AuthError;
use crate::meter::MeterReading;
use crate::rpc_api_reader::RpcApiReader;
use crate::status_api_reader::StatusApiReader;

/// Shelly devices accept exactly one username.
/// See: https://shelly-api-docs.shelly.cloud/gen2/General/Authentication
pub const SHELLY_USER: &str = "admin";

/// Upper bound on a single HTTP round trip so a stalled device cannot
/// wedge the poll loop.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a poll cycle failed. Every variant is recovered at the poller:
/// logged, and the next cycle proceeds normally.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("http transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed json response: {0}")]
    Json(#[from] serde_json::Error),
    /// The device sent a challenge this implementation cannot answer.
    /// A protocol or credential mismatch, not a transient condition.
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("device requires authentication but no password is configured")]
    PasswordRequired,
    #[error("401 response carried no WWW-Authenticate header")]
    MissingChallenge,
}

/// One attempt to obtain a meter reading from a device.
///
/// `Ok(None)` means the device answered but had no usable reading
/// (unexpected status, empty `meters`, missing `switch:0`); the caller
/// logs and keeps polling.
#[async_trait]
pub trait PowerReader: Send + Sync + 'static {
    async fn read(&self) -> Result<Option<MeterReading>, ReadError>;
}

/// The two supported protocol variants, selected once at startup from
/// the configured device generation. A closed set on purpose: adding a
/// third generation means adding a variant here.
pub enum ShellyReader {
    StatusApi(StatusApiReader),
    RpcApi(RpcApiReader),
}

impl ShellyReader {
    pub fn for_endpoint(endpoint: &DeviceEndpoint) -> Self {
        match endpoint.generation {
            Generation::Gen1 => ShellyReader::StatusApi(StatusApiReader::new(
                &endpoint.host,
                endpoint.password.clone(),
            )),
            Generation::Gen2Plus => {
                ShellyReader::RpcApi(RpcApiReader::new(&endpoint.host, endpoint.password.clone()))
            }
        }
    }
}

#[async_trait]
impl PowerReader for ShellyReader {
    async fn read(&self) -> Result<Option<MeterReading>, ReadError> {
        match self {
            ShellyReader::StatusApi(reader) => reader.read().await,
            ShellyReader::RpcApi(reader) => reader.read().await,
        }
    }
}
