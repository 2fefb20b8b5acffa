//! Temporary credentials for authenticated object-store access.
//!
//! [`RamRoleCredentials`] reads an instance-role credential document from the
//! cloud metadata service and caches it until it is expired or about to
//! expire within [`EXPIRY_SAFETY_WINDOW`].

use std::fmt;
use std::sync::Mutex;

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::http::HttpTimeouts;

/// Refresh credentials this long before they expire.
pub const EXPIRY_SAFETY_WINDOW: time::Duration = time::Duration::seconds(5);

pub const DEFAULT_METADATA_SERVICE: &str =
    "http://100.100.100.200/latest/meta-data/ram/security-credentials/";

const REFRESH_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential source not configured: {0}")]
    NotConfigured(String),

    #[error("credential endpoint request failed: {0}")]
    Http(String),

    #[error("invalid credential document: {0}")]
    Parse(String),

    #[error("credential expired at {0}")]
    Expired(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: String,
    pub expiration: OffsetDateTime,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("security_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Deserialize)]
struct CredentialDocument {
    #[serde(rename = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "AccessKeySecret")]
    access_key_secret: String,
    #[serde(rename = "SecurityToken")]
    security_token: String,
    #[serde(rename = "Expiration")]
    expiration: String,
}

impl Credential {
    /// Parse the metadata service's JSON document.
    pub fn from_json(body: &str) -> Result<Self, CredentialError> {
        let doc: CredentialDocument =
            serde_json::from_str(body).map_err(|e| CredentialError::Parse(e.to_string()))?;
        let expiration = OffsetDateTime::parse(&doc.expiration, &Rfc3339)
            .map_err(|e| CredentialError::Parse(format!("Expiration: {e}")))?;
        Ok(Self {
            access_key_id: doc.access_key_id,
            access_key_secret: doc.access_key_secret,
            security_token: doc.security_token,
            expiration,
        })
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiration <= now
    }

    /// Expired, or expiring within the safety window.
    pub fn needs_refresh_at(&self, now: OffsetDateTime) -> bool {
        self.expiration - now < EXPIRY_SAFETY_WINDOW
    }

    fn expiration_text(&self) -> String {
        self.expiration
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.expiration.to_string())
    }
}

pub trait CredentialProvider: Send + Sync {
    /// A credential valid for at least the safety window, refreshing if needed.
    fn credential(&self) -> Result<Credential, CredentialError>;
}

/// Fixed credential, mostly for tests and local setups.
pub struct StaticCredentials(Credential);

impl StaticCredentials {
    pub fn new(credential: Credential) -> Self {
        Self(credential)
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self) -> Result<Credential, CredentialError> {
        if self.0.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(CredentialError::Expired(self.0.expiration_text()));
        }
        Ok(self.0.clone())
    }
}

/// Instance-role credentials from the metadata service.
pub struct RamRoleCredentials {
    url: String,
    agent: ureq::Agent,
    cached: Mutex<Option<Credential>>,
}

impl RamRoleCredentials {
    pub fn new(
        metadata_service: &str,
        role: &str,
        timeouts: &HttpTimeouts,
    ) -> Result<Self, CredentialError> {
        if role.trim().is_empty() {
            return Err(CredentialError::NotConfigured("ram role is blank".into()));
        }
        let base = if metadata_service.trim().is_empty() {
            DEFAULT_METADATA_SERVICE
        } else {
            metadata_service.trim()
        };
        let url = if base.ends_with('/') {
            format!("{base}{}", role.trim())
        } else {
            format!("{base}/{}", role.trim())
        };
        Ok(Self {
            url,
            agent: timeouts.agent(),
            cached: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<Credential, CredentialError> {
        let mut response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| CredentialError::Http(format!("{}: {e}", self.url)))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(CredentialError::Http(format!(
                "{}: status {status}",
                self.url
            )));
        }
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| CredentialError::Http(format!("{}: {e}", self.url)))?;
        Credential::from_json(&body)
    }
}

impl CredentialProvider for RamRoleCredentials {
    fn credential(&self) -> Result<Credential, CredentialError> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        let now = OffsetDateTime::now_utc();
        if let Some(c) = cached.as_ref() {
            if !c.needs_refresh_at(now) {
                return Ok(c.clone());
            }
        }

        let mut last_err = CredentialError::Http("no attempt made".into());
        for attempt in 1..=REFRESH_ATTEMPTS {
            match self.fetch() {
                Ok(fresh) => {
                    info!(url = %self.url, expiration = %fresh.expiration_text(), "refreshed credential");
                    *cached = Some(fresh.clone());
                    return Ok(fresh);
                }
                Err(e) => {
                    warn!(attempt, url = %self.url, "credential refresh failed: {e}");
                    last_err = e;
                }
            }
        }

        // Still usable until it actually expires.
        match cached.as_ref() {
            Some(c) if !c.is_expired_at(now) => Ok(c.clone()),
            _ => Err(last_err),
        }
    }
}
