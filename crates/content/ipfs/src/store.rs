use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use stowage_content::{ByteStream, Capabilities, ContentError, ContentStore};
use stowage_core::ContentId;

use crate::cid;
use crate::config::IpfsConfig;
use crate::error::IpfsError;
use crate::types::{AddResponse, ApiError, PinLsResponse, RefLine};

/// Content store backed by an IPFS daemon's HTTP RPC API.
///
/// Identifiers are the daemon's content hashes. Retention is explicit: `put`
/// pins, `delete` unpins (the daemon reclaims the blocks on its next repo GC),
/// and [`list_local`](ContentStore::list_local) enumerates every block the
/// node holds via `refs/local`, which can be slow on large repositories.
/// Listed blocks are reported in the same CIDv0 form `put` returns.
pub struct IpfsContentStore {
    config: IpfsConfig,
    client: Client,
}

impl IpfsContentStore {
    /// Create a store talking to the daemon described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Connection`] if the HTTP client cannot be built.
    pub fn new(config: IpfsConfig) -> Result<Self, ContentError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ContentError::Connection(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Create a store with a custom HTTP client.
    pub fn with_client(config: IpfsConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.config.endpoint(path))
    }

    /// Send a request and turn non-2xx answers into [`IpfsError::Api`].
    async fn send(request: RequestBuilder) -> Result<Response, IpfsError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(IpfsError::Api { status, message })
    }

    /// Send a bounded (non-streaming) request.
    async fn send_bounded(&self, request: RequestBuilder) -> Result<Response, IpfsError> {
        Self::send(request.timeout(self.config.request_timeout)).await
    }

    fn parse_id(raw: String) -> Result<ContentId, ContentError> {
        ContentId::parse(raw).map_err(|e| ContentError::Backend(e.to_string()))
    }

    fn absorb_ref_line(line: &[u8], ids: &mut HashSet<ContentId>) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }
        match serde_json::from_slice::<RefLine>(line) {
            Ok(r) if r.err.is_empty() => match ContentId::parse(cid::normalize(&r.reference)) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(e) => debug!(error = %e, "skipping unusable local ref"),
            },
            Ok(r) => warn!(error = %r.err, "refs/local reported an error"),
            Err(e) => warn!(error = %e, "unparseable refs/local line"),
        }
    }
}

#[async_trait]
impl ContentStore for IpfsContentStore {
    fn name(&self) -> &str {
        "ipfs"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pinning: true,
            local_listing: true,
        }
    }

    async fn put(&self, data: Bytes) -> Result<ContentId, ContentError> {
        let size = data.len();
        let form = Form::new().part("file", Part::stream(data).file_name("attachment"));
        let response = self
            .send_bounded(
                self.post("add")
                    .query(&[("pin", "true"), ("cid-version", "0")])
                    .multipart(form),
            )
            .await?;
        let added: AddResponse = response.json().await.map_err(IpfsError::from)?;
        let id = Self::parse_id(added.hash)?;
        debug!(%id, bytes = size, "added and pinned content on IPFS");
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<ByteStream, ContentError> {
        let request = self.post("cat").query(&[("arg", id.as_str())]);
        let response = match Self::send(request).await {
            Ok(r) => r,
            Err(e) if e.mentions("not found") => {
                return Err(ContentError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(%id, "serving content from IPFS");
        Ok(response
            .bytes_stream()
            .map_err(|e| ContentError::from(IpfsError::from(e)))
            .boxed())
    }

    async fn delete(&self, id: &ContentId) -> Result<(), ContentError> {
        self.unpin(id).await
    }

    async fn pin(&self, id: &ContentId) -> Result<(), ContentError> {
        debug!(%id, "pinning object to local storage");
        match self
            .send_bounded(self.post("pin/add").query(&[("arg", id.as_str())]))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.mentions("not found") => Err(ContentError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn unpin(&self, id: &ContentId) -> Result<(), ContentError> {
        debug!(%id, "unpinning object from local storage");
        match self
            .send_bounded(self.post("pin/rm").query(&[("arg", id.as_str())]))
            .await
        {
            Ok(_) => Ok(()),
            // Already released: removal is idempotent.
            Err(e) if e.mentions("not pinned") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_retained(&self) -> Result<HashSet<ContentId>, ContentError> {
        let response = self
            .send_bounded(self.post("pin/ls").query(&[("type", "recursive")]))
            .await?;
        let listing: PinLsResponse = response.json().await.map_err(IpfsError::from)?;
        Ok(listing
            .keys
            .into_keys()
            .filter_map(|k| ContentId::parse(k).ok())
            .collect())
    }

    async fn list_local(&self) -> Result<HashSet<ContentId>, ContentError> {
        let response = Self::send(self.post("refs/local")).await?;
        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut ids = HashSet::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(IpfsError::from)?;
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                Self::absorb_ref_line(&line, &mut ids);
            }
        }
        Self::absorb_ref_line(&pending, &mut ids);

        debug!(count = ids.len(), "listed local IPFS objects");
        Ok(ids)
    }
}
