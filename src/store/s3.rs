//! S3 content store
//!
//! The AWS SDK is async-only. `S3Store` owns a current-thread tokio runtime
//! and blocks on every request, so the rest of the crate stays synchronous and
//! one request is in flight at a time.

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::ExposeSecret;
use tokio::runtime::Runtime;

use crate::artifact::Artifact;
use crate::config::S3Settings;
use crate::error::StoreError;
use crate::logging::log;
use crate::store::ContentStore;

/// Characters left as-is in object keys: RFC 3986 unreserved plus `/`
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Region assumed for custom endpoints when none is configured
const DEFAULT_ENDPOINT_REGION: &str = "us-east-1";

pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
    /// Scheme and host that object URLs are built on, without trailing slash
    url_base: String,
}

impl S3Store {
    /// Builds the client, checks the bucket exists and looks up its location
    ///
    /// Static credentials are used when both `s3.access.key` and
    /// `s3.secret.key` are set and non-empty; otherwise the AWS default
    /// provider chain applies.
    ///
    /// # Errors
    /// - `StoreError::Runtime` if the tokio runtime cannot start
    /// - `StoreError::BucketUnavailable` if the bucket is missing or forbidden
    /// - `StoreError::Location` if the bucket location cannot be read
    pub fn connect(settings: &S3Settings) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        let region = settings
            .region
            .clone()
            .or_else(|| settings.endpoint.as_ref().map(|_| DEFAULT_ENDPOINT_REGION.to_string()));
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }

        let access_key = settings.access_key.as_deref().unwrap_or_default();
        let secret_key = settings
            .secret_key
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .unwrap_or_default();
        if !access_key.is_empty() && !secret_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "sftp-fetch",
            ));
        }

        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = runtime.block_on(loader.load());
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint.is_some())
            .build();
        let client = Client::from_conf(s3_config);

        let bucket = settings.bucket.clone();

        runtime
            .block_on(client.head_bucket().bucket(&bucket).send())
            .map_err(|e| StoreError::BucketUnavailable {
                bucket: bucket.clone(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        let url_base = match &settings.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let output = runtime
                    .block_on(client.get_bucket_location().bucket(&bucket).send())
                    .map_err(|e| StoreError::Location {
                        bucket: bucket.clone(),
                        message: DisplayErrorContext(e).to_string(),
                    })?;
                let location = output
                    .location_constraint()
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default();
                format!("https://{}", host_for_location(&location))
            }
        };

        let _ = log(&format!("Using bucket '{}' at {}", bucket, url_base));

        Ok(S3Store {
            runtime,
            client,
            bucket,
            url_base,
        })
    }
}

impl ContentStore for S3Store {
    fn key_exists(&self, key: &str) -> Result<bool, StoreError> {
        let result = self
            .runtime
            .block_on(self.client.head_object().bucket(&self.bucket).key(key).send());

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Lookup {
                        key: key.to_string(),
                        message: DisplayErrorContext(service_error).to_string(),
                    })
                }
            }
        }
    }

    fn store(&self, key: &str, artifact: &Artifact) -> Result<(), StoreError> {
        let upload_err = |message: String| StoreError::Upload {
            key: key.to_string(),
            message,
        };

        self.runtime.block_on(async {
            let body = ByteStream::from_path(artifact.path())
                .await
                .map_err(|e| upload_err(e.to_string()))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| upload_err(DisplayErrorContext(e).to_string()))?;

            Ok::<(), StoreError>(())
        })
    }

    fn resource_url_for(&self, key: &str) -> Result<String, StoreError> {
        Ok(object_url(&self.url_base, &self.bucket, key))
    }
}

/// S3 website host for a bucket location constraint
///
/// The US standard region reports an empty constraint (or the legacy `US`),
/// and the legacy `EU` constraint means eu-west-1.
pub fn host_for_location(location: &str) -> String {
    match location {
        "" | "US" | "us-east-1" => "s3.amazonaws.com".to_string(),
        "EU" => "s3.eu-west-1.amazonaws.com".to_string(),
        region => format!("s3.{}.amazonaws.com", region),
    }
}

/// Path-style URL of an object
pub fn object_url(url_base: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        url_base,
        bucket,
        utf8_percent_encode(key, KEY_ENCODE_SET)
    )
}
