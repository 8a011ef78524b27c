use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rusoto_s3::{PutObjectRequest, S3Client, StreamingBody, S3};
use url::{ParseError, Url};

use crate::errors::BackendError;

pub mod mock;

pub trait Store: Send + Sync {
    /// The type of successful result.
    type Output;

    /// The type of raw data.
    type Raw;

    /// Gets the public URL for the given object.
    fn get_url(&self, key: &str) -> Result<Url, ParseError>;

    /// Saves the given data under the given key, replacing any object
    /// already there.
    fn save(
        &self,
        key: &str,
        content_type: String,
        raw: Self::Raw,
    ) -> BoxFuture<Result<Self::Output, BackendError>>;
}

/// A store that saves its data to S3.
pub struct S3Store {
    client: Arc<S3Client>,
    acl: String,
    bucket: String,
    cache_control: String,
    base_url: Url,
}

impl S3Store {
    /// Creates a new instance.
    pub fn new(
        client: Arc<S3Client>,
        acl: String,
        bucket: String,
        cache_control: String,
        base_url: Url,
    ) -> Self {
        Self {
            client,
            acl,
            bucket,
            cache_control,
            base_url,
        }
    }

    pub fn from_env() -> Result<Self, rusoto_core::request::TlsError> {
        use rusoto_core::request::HttpClient;
        use rusoto_core::Region;
        use rusoto_credential::StaticProvider;

        use crate::config::{get_url, get_variable, get_variable_or};

        let access_key = get_variable("S3_ACCESS_KEY");
        let secret_access_key = get_variable("S3_SECRET_ACCESS_KEY");

        let region = Region::Custom {
            name: get_variable("S3_REGION_NAME"),
            endpoint: get_variable("S3_ENDPOINT"),
        };

        let bucket = get_variable("S3_BUCKET_NAME");
        let acl = get_variable_or("TRACKER_S3_ACL", "public-read");
        let cache_control = get_variable_or("TRACKER_S3_CACHE_CONTROL", "max-age=86400");

        let client = Arc::new(S3Client::new_with(
            HttpClient::new()?,
            StaticProvider::new_minimal(access_key, secret_access_key),
            region,
        ));

        Ok(S3Store::new(
            client,
            acl,
            bucket,
            cache_control,
            get_url("S3_BASE_URL"),
        ))
    }
}

impl Store for S3Store {
    type Output = ();
    type Raw = Vec<u8>;

    fn get_url(&self, key: &str) -> Result<Url, ParseError> {
        self.base_url.join(key)
    }

    fn save(
        &self,
        key: &str,
        content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<(), BackendError>> {
        upload(self, key.to_owned(), content_type, raw).boxed()
    }
}

async fn upload(
    store: &S3Store,
    key: String,
    content_type: String,
    raw: Vec<u8>,
) -> Result<(), BackendError> {
    let len = raw.len() as i64;

    let request = PutObjectRequest {
        acl: Some(store.acl.clone()),
        body: Some(StreamingBody::from(raw)),
        bucket: store.bucket.clone(),
        cache_control: Some(store.cache_control.clone()),
        content_length: Some(len),
        content_type: Some(content_type),
        key,
        ..Default::default()
    };

    store
        .client
        .put_object(request)
        .await
        .map(|_| ())
        .map_err(|source| BackendError::UploadFailed { source })
}
