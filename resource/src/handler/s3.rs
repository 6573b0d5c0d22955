//! Object-storage handler for `s3://bucket/key` locations.
//!
//! Requests are driven by a private current-thread runtime per operation;
//! the rest of the crate stays synchronous.

use std::future::Future;
use std::io::{Cursor, Read};
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_sts::config::{Credentials, Region};
use aws_sdk_sts::error::DisplayErrorContext;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, ObjectStore, PutOptions, PutPayload};

use super::{FileReference, Handler, read_with_progress, url_base_name};
use crate::config::S3Options;
use crate::error::{ResourceError, Result};
use crate::progress::ProgressSink;

/// Session name used for assumed roles when none is configured.
const DEFAULT_SESSION_NAME: &str = "metalink-resource";

/// Resolves `s3://` URLs.
///
/// Requests are signed when an access key or a role is configured and
/// anonymous otherwise. A configured role is assumed afresh for every
/// resolved location.
#[derive(Clone, Debug, Default)]
pub struct S3Handler {
    options: S3Options,
}

impl S3Handler {
    /// A handler using `options` for every bucket it resolves.
    #[must_use]
    pub const fn new(options: S3Options) -> Self {
        Self { options }
    }

    fn store_for(&self, url: &str, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);
        if let Some(region) = &self.options.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.options.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let configured = self.static_keys()?;
        let signing = match &self.options.role_arn {
            Some(role_arn) => Some(self.assume_role(url, role_arn, configured)?),
            None => configured,
        };
        builder = match signing {
            Some(keys) => {
                let signed = builder
                    .with_access_key_id(keys.access_key)
                    .with_secret_access_key(keys.secret_key);
                match keys.session_token {
                    Some(token) => signed.with_token(token),
                    None => signed,
                }
            }
            None => builder.with_skip_signature(true),
        };
        let store = builder
            .build()
            .map_err(|err| ResourceError::transport(url, err))?;
        Ok(Arc::new(store))
    }

    fn static_keys(&self) -> Result<Option<Keys>> {
        if self.options.role_session_name.is_some() && self.options.role_arn.is_none() {
            return Err(ResourceError::configuration(
                "s3 options: role_session_name requires role_arn",
            ));
        }
        match (&self.options.access_key, &self.options.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(Keys {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                session_token: self.options.session_token.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(ResourceError::configuration(
                "s3 options: access_key and secret_key must be given together",
            )),
        }
    }

    /// Exchange `base`, or the ambient AWS credential chain when none are
    /// configured, for temporary credentials of `role_arn`.
    fn assume_role(&self, url: &str, role_arn: &str, base: Option<Keys>) -> Result<Keys> {
        let session_name = self
            .options
            .role_session_name
            .as_deref()
            .unwrap_or(DEFAULT_SESSION_NAME);
        let region_name = self.options.region.clone();
        let output = block_on(url, async move {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region_name {
                loader = loader.region(Region::new(region));
            }
            if let Some(keys) = base {
                loader = loader.credentials_provider(Credentials::new(
                    keys.access_key,
                    keys.secret_key,
                    keys.session_token,
                    None,
                    "metalink-resource",
                ));
            }
            let config = loader.load().await;
            aws_sdk_sts::Client::new(&config)
                .assume_role()
                .role_arn(role_arn)
                .role_session_name(session_name)
                .send()
                .await
        })?
        .map_err(|err| ResourceError::transport(url, DisplayErrorContext(&err)))?;
        let credentials = output.credentials().ok_or_else(|| {
            ResourceError::transport(url, format!("assuming {role_arn} returned no credentials"))
        })?;
        log::debug!("assumed role {role_arn} as session {session_name}");
        Ok(Keys {
            access_key: credentials.access_key_id().to_owned(),
            secret_key: credentials.secret_access_key().to_owned(),
            session_token: Some(credentials.session_token().to_owned()),
        })
    }
}

/// Signing keys handed to the object store.
struct Keys {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
}

/// Run `future` to completion on a private current-thread runtime.
fn block_on<F: Future>(url: &str, future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| ResourceError::transport(url, err))?;
    Ok(runtime.block_on(future))
}

impl Handler for S3Handler {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn supports(&self, url: &str) -> bool {
        url.starts_with("s3://")
    }

    fn resolve(&self, url: &str) -> Result<Box<dyn FileReference>> {
        let (bucket, key) = split_bucket_key(url)?;
        Ok(Box::new(S3Object {
            url: url.to_owned(),
            name: url_base_name(key).to_owned(),
            key: ObjectPath::from(key),
            store: self.store_for(url, bucket)?,
        }))
    }
}

/// Split `s3://bucket/key` into its bucket and key.
fn split_bucket_key(url: &str) -> Result<(&str, &str)> {
    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| ResourceError::transport(url, "not an s3 url"))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(ResourceError::transport(url, "expected s3://bucket/key")),
    }
}

struct S3Object {
    url: String,
    name: String,
    key: ObjectPath,
    store: Arc<dyn ObjectStore>,
}

impl S3Object {
    fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        block_on(&self.url, future)
    }
}

impl FileReference for S3Object {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Result<u64> {
        let options = GetOptions {
            head: true,
            ..GetOptions::default()
        };
        let result = self
            .block_on(self.store.get_opts(&self.key, options))?
            .map_err(|err| ResourceError::transport(&self.url, err))?;
        Ok(u64::try_from(result.meta.size).unwrap_or(u64::MAX))
    }

    fn reader(&self) -> Result<Box<dyn Read>> {
        let bytes = self
            .block_on(async {
                let result = self.store.get_opts(&self.key, GetOptions::default()).await?;
                result.bytes().await
            })?
            .map_err(|err| ResourceError::transport(&self.url, err))?;
        Ok(Box::new(Cursor::new(bytes.to_vec())))
    }

    fn reader_uri(&self) -> String {
        self.url.clone()
    }

    fn write_from(&self, source: &dyn FileReference, progress: &dyn ProgressSink) -> Result<u64> {
        let body = read_with_progress(source, &self.name, progress)?;
        let written = u64::try_from(body.len()).unwrap_or(u64::MAX);
        self.block_on(
            self.store
                .put_opts(&self.key, PutPayload::from(body), PutOptions::default()),
        )?
        .map_err(|err| ResourceError::transport(&self.url, err))?;
        log::debug!("uploaded {written} bytes to {}", self.url);
        Ok(written)
    }
}
