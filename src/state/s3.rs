//! Remote state in S3.
//!
//! Stores the state record as `<prefix>/state.json` in an S3 (or compatible)
//! bucket so several machines can share one state.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{FleetformError, Result, StateError};

use super::backend::StateBackend;
use super::types::StateRecord;

/// State file key suffix.
const STATE_KEY: &str = "state.json";

/// S3-based state backend.
#[derive(Debug)]
pub struct S3StateBackend {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Key prefix, empty or ending in `/`.
    prefix: String,
}

impl S3StateBackend {
    /// Creates a new S3 state backend from the ambient AWS configuration.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_owned()));
        }
        let config = loader.load().await;

        Self::with_client(Client::new(&config), bucket, prefix)
    }

    /// Creates a new S3 state backend with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_owned(),
            prefix: normalize_prefix(prefix),
        }
    }

    /// Gets the full S3 key of the state object.
    fn key(&self) -> String {
        format!("{}{STATE_KEY}", self.prefix)
    }
}

/// Normalizes a key prefix to either empty or `segment/`.
fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .map(|p| format!("{p}/"))
        .unwrap_or_default()
}

#[async_trait]
impl StateBackend for S3StateBackend {
    async fn load(&self) -> Result<Option<StateRecord>> {
        let key = self.key();
        debug!("Fetching s3://{}/{key}", self.bucket);

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(sdk_err) => {
                let err = sdk_err.into_service_error();
                if err.is_no_such_key() {
                    debug!("s3://{}/{key} does not exist, starting empty", self.bucket);
                    return Ok(None);
                }
                return Err(FleetformError::State(StateError::s3(format!("GetObject {key} failed: {err}"))));
            }
        };

        let bytes = response.body.collect().await.map_err(|e| {
            FleetformError::State(StateError::s3(format!("Failed to read S3 object: {e}")))
        })?;

        let record: StateRecord = serde_json::from_slice(&bytes.into_bytes()).map_err(|e| {
            FleetformError::State(StateError::Corrupted {
                message: format!("State object {key} is not a state record: {e}"),
            })
        })?;

        info!("Loaded state version {} from S3", record.version);
        Ok(Some(record))
    }

    async fn save(&self, record: &StateRecord) -> Result<()> {
        let key = self.key();
        info!("Saving state version {} to s3://{}/{key}", record.version, self.bucket);

        let body = serde_json::to_vec_pretty(record).map_err(|e| {
            FleetformError::State(StateError::serialization(format!("Cannot encode state record: {e}")))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body.into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| FleetformError::State(StateError::s3(format!("PutObject {key} failed: {e}"))))?;

        debug!("State version {} stored", record.version);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}
