use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::Date;

use crate::auth::ADMIN_USERNAME;
use crate::dates;
use crate::errors::BackendError;
use crate::normalization;

/// The maximum length of a client identifier.
const MAX_ID_LENGTH: usize = 64;

/// A client identifier. Doubles as the client’s login username, so it
/// must be URL- and key-safe and can never be the admin username.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, BackendError> {
        let raw = raw.as_ref();
        let id = raw.trim();

        let valid = !id.is_empty()
            && id.len() <= MAX_ID_LENGTH
            && id != ADMIN_USERNAME
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

        if valid {
            Ok(ClientId(id.to_owned()))
        } else {
            Err(BackendError::InvalidId(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ClientId::parse(s).map_err(serde::de::Error::custom)
    }
}

/// A client of the trainer. Created and edited by the admin only.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Client {
    pub(crate) id: ClientId,

    #[serde(flatten)]
    pub(crate) details: ClientDetails,
}

impl Client {
    pub fn new(id: ClientId, details: ClientDetails) -> Self {
        Client { id, details }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn details(&self) -> &ClientDetails {
        &self.details
    }
}

/// The editable part of a client record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClientDetails {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub(crate) first_name: String,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub(crate) last_name: String,

    #[serde(with = "dates::iso")]
    pub(crate) date_of_birth: Date,

    /// The training program the client follows.
    #[serde(default)]
    pub(crate) program: String,

    /// The acquisition channel.
    #[serde(default)]
    pub(crate) source: String,
}

impl ClientDetails {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: Date,
        program: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        ClientDetails {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth,
            program: program.into(),
            source: source.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub(crate) fn validate(&self) -> Result<(), BackendError> {
        if self.first_name.is_empty() {
            return Err(BackendError::InvalidField {
                field: "first_name",
                reason: "must not be blank",
            });
        }

        if self.last_name.is_empty() {
            return Err(BackendError::InvalidField {
                field: "last_name",
                reason: "must not be blank",
            });
        }

        Ok(())
    }
}

/// The body of a client creation request.
#[derive(Clone, Debug, Deserialize)]
pub struct NewClient {
    pub(crate) id: ClientId,

    #[serde(flatten)]
    pub(crate) details: ClientDetails,
}
