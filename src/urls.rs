use url::Url;
use uuid::Uuid;

use crate::client::ClientId;

/// Convenience wrapper for URL generation functions.
#[derive(Clone)]
pub struct Urls {
    /// Top-level URL, including trailing slash.
    base: Url,

    /// Path segment under which every API route lives.
    pub(crate) api_path: String,

    /// Prefix for all API URLs.
    api_prefix: String,
}

impl Urls {
    /// Create a new instance. `api_path` should *not* include a trailing slash.
    pub fn new(base: Url, api_path: impl Into<String>) -> Self {
        let api_path = api_path.into();
        let api_prefix = format!("{}/", api_path);

        Urls {
            base,
            api_path,
            api_prefix,
        }
    }

    fn api(&self, path: &str) -> Url {
        let path = format!("{}{}", self.api_prefix, path);

        // every segment we join is a validated client ID or a UUID
        self.base.join(&path).unwrap_or_else(|_| self.base.clone())
    }

    pub fn client(&self, id: &ClientId) -> Url {
        self.api(&format!("clients/{}", id))
    }

    pub fn session(&self, id: &Uuid) -> Url {
        self.api(&format!("sessions/{}", id))
    }

    pub fn body_compositions(&self, client: &ClientId) -> Url {
        self.api(&format!("clients/{}/body", client))
    }

    pub fn nutrition(&self, client: &ClientId) -> Url {
        self.api(&format!("clients/{}/nutrition", client))
    }
}
