//! Read-only HTTP object backend.
//!
//! `HEAD` yields the change token (`ETag`, else `Last-Modified`) and the
//! acknowledgement map from `x-oss-meta-<node>` headers; `GET` yields the
//! content. 404 is `NotFound`. Writing acknowledgements needs a signed
//! metadata update this backend does not perform, so `set_node_ack` returns
//! `Unsupported`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{
    decode_content, CredentialProvider, Endpoint, Fetch, NodeAck, ObjectMetadata,
    RemoteDictStore, StoreError,
};

const ACK_HEADER_PREFIX: &str = "x-oss-meta-";
const TOKEN_HEADER: &str = "x-oss-security-token";
const MAX_CONTENT_BYTES: u64 = 64 * 1024 * 1024;

/// Connect / read / overall bounds for every remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub overall: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(15),
            overall: Duration::from_secs(30),
        }
    }
}

impl HttpTimeouts {
    pub(crate) fn agent(&self) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_connect(Some(self.connect))
            .timeout_recv_response(Some(self.read))
            .timeout_recv_body(Some(self.read))
            .timeout_global(Some(self.overall))
            .http_status_as_error(false)
            .build()
            .into()
    }
}

pub struct HttpStore {
    agent: ureq::Agent,
    /// Service host for `oss://bucket/key` endpoints.
    oss_host: String,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl HttpStore {
    pub fn new(oss_host: impl Into<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            agent: timeouts.agent(),
            oss_host: oss_host.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    fn url(&self, endpoint: &str) -> Result<String, StoreError> {
        let parsed = Endpoint::parse(endpoint)?;
        if matches!(parsed, Endpoint::Oss { .. }) && self.oss_host.trim().is_empty() {
            return Err(StoreError::Malformed(format!(
                "oss endpoint {endpoint} needs remote.oss.endpoint"
            )));
        }
        parsed
            .url(&self.oss_host)
            .ok_or(StoreError::Unsupported("http store (file endpoint)"))
    }

    fn session_token(&self) -> Result<Option<String>, StoreError> {
        match &self.credentials {
            Some(provider) => Ok(Some(provider.credential()?.security_token)),
            None => Ok(None),
        }
    }

    fn send(
        &self,
        request: ureq::RequestBuilder<ureq::typestate::WithoutBody>,
        url: &str,
    ) -> Result<Option<ureq::http::Response<ureq::Body>>, StoreError> {
        let request = match self.session_token()? {
            Some(token) => request.header(TOKEN_HEADER, token.as_str()),
            None => request,
        };
        let response = request.call().map_err(|e| transport_error(url, e))?;
        let status = response.status().as_u16();
        match status {
            200..=299 => Ok(Some(response)),
            404 => Ok(None),
            _ => Err(StoreError::Unavailable(format!("{url}: status {status}"))),
        }
    }
}

fn transport_error(url: &str, e: ureq::Error) -> StoreError {
    match e {
        ureq::Error::Timeout(_) => StoreError::Timeout(format!("{url}: {e}")),
        other => StoreError::Unavailable(format!("{url}: {other}")),
    }
}

fn header_str<'a>(response: &'a ureq::http::Response<ureq::Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

impl RemoteDictStore for HttpStore {
    fn metadata(&self, endpoint: &str) -> Result<Fetch<ObjectMetadata>, StoreError> {
        let url = self.url(endpoint)?;
        let Some(response) = self.send(self.agent.head(&url), &url)? else {
            debug!(%url, "remote dictionary not found");
            return Ok(Fetch::NotFound);
        };
        let etag = header_str(&response, "etag")
            .or_else(|| header_str(&response, "last-modified"))
            .ok_or_else(|| StoreError::Malformed(format!("{url}: no ETag or Last-Modified")))?
            .to_string();
        let acks: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let node = name.as_str().strip_prefix(ACK_HEADER_PREFIX)?;
                Some((node.to_lowercase(), value.to_str().ok()?.to_string()))
            })
            .collect();
        Ok(Fetch::Found(ObjectMetadata { etag, acks }))
    }

    fn content(&self, endpoint: &str) -> Result<Fetch<Vec<String>>, StoreError> {
        let url = self.url(endpoint)?;
        let Some(response) = self.send(self.agent.get(&url), &url)? else {
            return Ok(Fetch::NotFound);
        };
        let bytes = response
            .into_body()
            .with_config()
            .limit(MAX_CONTENT_BYTES)
            .read_to_vec()
            .map_err(|e| transport_error(&url, e))?;
        Ok(Fetch::Found(decode_content(bytes)?))
    }

    fn set_node_ack(&self, _endpoint: &str, _ack: &NodeAck) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("http store"))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
