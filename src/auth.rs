use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::ClientId;
use crate::errors::BackendError;

/// The one privileged username.
pub const ADMIN_USERNAME: &str = "admin";

const BEARER_PREFIX: &str = "Bearer ";

/// A stored login credential.
#[derive(Clone, Debug)]
pub struct Credential {
    pub(crate) username: String,

    /// The display name.
    pub(crate) name: String,

    /// A salted bcrypt hash of the password.
    pub(crate) password_hash: String,
}

impl Credential {
    pub fn new(username: String, name: String, password_hash: String) -> Self {
        Credential {
            username,
            name,
            password_hash,
        }
    }
}

/// The body of a login request.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

/// Who is behind a login token.
#[derive(Clone, Debug)]
pub struct Identity {
    pub(crate) username: String,
    pub(crate) name: String,
}

impl Identity {
    pub fn new(username: String, name: String) -> Self {
        Identity { username, name }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", content = "client", rename_all = "snake_case")]
pub enum Role {
    Admin,
    Client(ClientId),
}

/// The authenticated identity behind a single request. Built once when
/// the request comes in and handed to every operation that needs to
/// know who is asking.
#[derive(Clone, Debug, Serialize)]
pub struct SessionContext {
    pub(crate) username: String,
    pub(crate) name: String,

    #[serde(flatten)]
    pub(crate) role: Role,
}

impl SessionContext {
    pub fn new(identity: Identity) -> Result<Self, BackendError> {
        let role = if identity.username == ADMIN_USERNAME {
            Role::Admin
        } else {
            // a credential whose username can't be a client ID can't
            // own any records
            Role::Client(ClientId::parse(&identity.username).map_err(|_| BackendError::Forbidden)?)
        };

        Ok(SessionContext {
            username: identity.username,
            name: identity.name,
            role,
        })
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), BackendError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(BackendError::Forbidden)
        }
    }

    /// Admins may act on any client; clients only on themselves.
    pub fn require_access(&self, client: &ClientId) -> Result<(), BackendError> {
        match &self.role {
            Role::Admin => Ok(()),
            Role::Client(own) if own == client => Ok(()),
            Role::Client(_) => Err(BackendError::Forbidden),
        }
    }
}

/// Extracts the login token from an `Authorization: Bearer …` header.
pub fn parse_bearer(header: Option<&str>) -> Result<Uuid, BackendError> {
    let value = header.ok_or(BackendError::Unauthenticated)?.trim();

    if !value.starts_with(BEARER_PREFIX) {
        return Err(BackendError::Unauthenticated);
    }

    Uuid::parse_str(value[BEARER_PREFIX.len()..].trim()).map_err(|_| BackendError::Unauthenticated)
}

/// Checks `password` against a bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, BackendError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|source| BackendError::TaskFailed { source })?
        .map_err(|source| BackendError::PasswordHashing { source })
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, BackendError> {
    bcrypt::hash(password, cost).map_err(|source| BackendError::PasswordHashing { source })
}
