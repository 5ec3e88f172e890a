//! HTTP retrieval from a swarm gateway.
//!
//! The fetcher downloads an artifact's info dictionary, checks that it hashes
//! to the identifier's info hash, then downloads the payload and checks every
//! piece before handing it back.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use magnetcast_common::{ContentId, Error, Result};
use url::Url;

use crate::artifact::{ArtifactInfo, InfoHash};
use crate::magnet::Magnet;
use crate::provider::{ContentFetcher, RetrievalProgress, RetrieveOptions};

/// Fetches payloads from a gateway exposing `/swarm/{info_hash}/info` and
/// `/swarm/{info_hash}/data`.
#[derive(Debug, Clone)]
pub struct HttpSwarmFetcher {
    client: reqwest::Client,
    gateway: Url,
}

impl HttpSwarmFetcher {
    pub fn new(gateway: Url) -> Self {
        Self::with_client(reqwest::Client::new(), gateway)
    }

    pub fn with_client(client: reqwest::Client, mut gateway: Url) -> Self {
        if !gateway.path().ends_with('/') {
            let path = format!("{}/", gateway.path());
            gateway.set_path(&path);
        }
        Self { client, gateway }
    }

    pub fn gateway(&self) -> &Url {
        &self.gateway
    }

    fn endpoint(&self, hash: &InfoHash, leaf: &str) -> Result<Url> {
        self.gateway
            .join(&format!("swarm/{hash}/{leaf}"))
            .map_err(|e| Error::Http(format!("bad gateway URL: {e}")))
    }

    async fn fetch(
        &self,
        id: &ContentId,
        magnet: &Magnet,
        options: &RetrieveOptions,
    ) -> Result<Bytes> {
        let fail = |msg: String| Error::retrieval(id, msg);

        let info_url = self.endpoint(&magnet.info_hash, "info")?;
        let info_bytes = self
            .client
            .get(info_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(format!("info request: {e}")))?
            .bytes()
            .await
            .map_err(|e| fail(format!("info body: {e}")))?;

        if InfoHash::of_info(&info_bytes) != magnet.info_hash {
            return Err(fail("info dictionary does not match identifier".into()));
        }
        let info = ArtifactInfo::decode(&info_bytes).map_err(|e| fail(e.to_string()))?;

        let data_url = self.endpoint(&magnet.info_hash, "data")?;
        let mut response = self
            .client
            .get(data_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(format!("data request: {e}")))?;

        let mut payload = BytesMut::with_capacity(info.length as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fail(format!("data body: {e}")))?
        {
            payload.extend_from_slice(&chunk);
            if payload.len() as u64 > info.length {
                return Err(fail("payload longer than declared length".into()));
            }
            if let Some(progress) = &options.progress {
                progress.send(
                    id,
                    RetrievalProgress {
                        received: payload.len() as u64,
                        total: Some(info.length),
                    },
                );
            }
        }

        info.verify(&payload).map_err(fail)?;
        tracing::debug!(content_id = %id, bytes = payload.len(), "Retrieved segment");
        Ok(payload.freeze())
    }
}

#[async_trait]
impl ContentFetcher for HttpSwarmFetcher {
    async fn retrieve(&self, id: &ContentId, options: &RetrieveOptions) -> Result<Bytes> {
        let magnet = Magnet::from_content_id(id).map_err(|e| Error::retrieval(id, e))?;
        let fetch = self.fetch(id, &magnet, options);

        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| Error::retrieval(id, format!("timed out after {limit:?}")))?,
            None => fetch.await,
        }
    }
}
