//! Rate key derivation.

use sha2::{Digest, Sha256};

use crate::error::{CallgateError, Result};

/// The identity a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    /// Client IP address as resolved by the identity source
    pub ip: String,
    /// Client user-agent string, if the request carried one
    pub user_agent: Option<String>,
}

impl CallerIdentity {
    /// Create an identity from an IP only.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: None,
        }
    }

    /// Attach a user-agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Opaque, fixed-length key a caller's counter is stored under.
///
/// The key is the lowercase hex SHA-256 digest of the IP, optionally
/// followed by the user-agent string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey(String);

impl RateKey {
    /// Length of every key in characters.
    pub const LEN: usize = 64;

    /// Derive the key for an identity.
    ///
    /// An empty IP is rejected: keying on it would put every unidentified
    /// caller into one shared bucket.
    pub fn derive(identity: &CallerIdentity, include_user_agent: bool) -> Result<Self> {
        if identity.ip.trim().is_empty() {
            return Err(CallgateError::InvalidIdentity(
                "caller IP is empty".to_string(),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(identity.ip.as_bytes());
        if include_user_agent {
            hasher.update(identity.user_agent.as_deref().unwrap_or("").as_bytes());
        }

        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// The key as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
