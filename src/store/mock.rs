use std::collections::HashMap;
use std::sync::RwLock;

use futures::future::{ready, BoxFuture, FutureExt};
use url::{ParseError, Url};

use crate::errors::BackendError;
use crate::store::Store;

/// An object held by [`MockStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A store that keeps everything in memory. Used by the HTTP tests.
pub struct MockStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    base_url: Url,
    fail_uploads: bool,
}

impl MockStore {
    pub fn new(base_url: Url) -> Self {
        MockStore {
            objects: RwLock::new(HashMap::new()),
            base_url,
            fail_uploads: false,
        }
    }

    /// A store that refuses every upload, for exercising failure paths.
    pub fn failing(base_url: Url) -> Self {
        MockStore {
            fail_uploads: true,
            ..MockStore::new(base_url)
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn put(&self, key: &str, content_type: String, data: Vec<u8>) -> Result<(), BackendError> {
        if self.fail_uploads {
            return Err(BackendError::UploadFailed {
                source: rusoto_core::RusotoError::Validation("uploads disabled".to_owned()),
            });
        }

        let mut objects = self.objects.write().map_err(|_| BackendError::LockPoisoned)?;
        objects.insert(key.to_owned(), StoredObject { content_type, data });

        Ok(())
    }
}

impl Store for MockStore {
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
        ready(self.put(key, content_type, raw)).boxed()
    }
}
