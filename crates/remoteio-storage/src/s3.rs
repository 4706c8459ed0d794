use crate::traits::{StorageError, StorageResult, StoreConnector};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use remoteio_core::RemoteIoConfig;
use std::sync::Arc;

/// Bucket used to validate the builder at construction time.
const PROBE_BUCKET: &str = "remoteio-probe";

/// S3 connector
///
/// Credentials, profile and region defaults come from the ambient AWS
/// environment (`AmazonS3Builder::from_env`). Region and endpoint from
/// [`RemoteIoConfig`] override them when set.
#[derive(Clone, Debug)]
pub struct S3Connector {
    region: Option<String>,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    allow_http: bool,
}

impl S3Connector {
    /// Create a connector and check that a store can be built from the environment.
    pub fn new(config: &RemoteIoConfig) -> StorageResult<Self> {
        let connector = S3Connector {
            region: config.s3_region.clone(),
            endpoint_url: config.s3_endpoint.clone(),
            allow_http: config.allow_http(),
        };

        connector.builder(PROBE_BUCKET).build().map_err(|e| {
            tracing::error!(error = %e, "S3 client initialization failed");
            StorageError::InitializationFailed {
                message: "could not build S3 client from environment".to_string(),
                source: Some(Box::new(e)),
            }
        })?;

        tracing::info!(
            region = connector.region.as_deref().unwrap_or("<env>"),
            endpoint = connector.endpoint_url.as_deref().unwrap_or("<aws>"),
            "S3 client initialized"
        );

        Ok(connector)
    }

    fn builder(&self, bucket: &str) -> AmazonS3Builder {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(ref region) = self.region {
            builder = builder.with_region(region.clone());
        }

        if let Some(ref endpoint) = self.endpoint_url {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(self.allow_http);
        }

        builder
    }
}

#[async_trait]
impl StoreConnector for S3Connector {
    async fn connect(&self, container: &str) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
        let store = self.builder(container).build()?;
        Ok(Arc::new(store))
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_with_explicit_endpoint() {
        let config = RemoteIoConfig {
            s3_region: Some("us-east-1".to_string()),
            s3_endpoint: Some("http://localhost:9000".to_string()),
            ..RemoteIoConfig::default()
        };

        let connector = S3Connector::new(&config).unwrap();
        assert!(connector.allow_http);
        assert!(connector.connect("bucket").await.is_ok());
        assert_eq!(connector.name(), "s3");
    }
}
