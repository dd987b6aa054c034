//! The IPFS HTTP API client, used as the [`ContentStore`] of tokens and,
//! through IPNS keys named after the channel id, as the [`NamingService`].
//!
//! Tokens are stored as hex text.
use std::time::Duration;

use async_trait::async_trait;
use primitives::{
    storage::{ContentStore, Error, NameKey, NamingService},
    ChannelId, Config, ContentPointer,
};
use reqwest::{multipart, Client, Response};
use serde::Deserialize;
use slog::{debug, Logger};

const IPFS_PATH_PREFIX: &str = "/ipfs/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyResponse {
    name: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyListResponse {
    #[serde(default)]
    keys: Vec<KeyResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResolveResponse {
    path: String,
}

/// The error body of the IPFS HTTP API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    message: String,
}

impl From<KeyResponse> for NameKey {
    fn from(key: KeyResponse) -> Self {
        Self {
            name: key.name,
            id: key.id,
        }
    }
}

#[derive(Debug, Clone)]
/// The `Ipfs` client is cheap to clone
pub struct Ipfs {
    api_url: String,
    client: Client,
    logger: Logger,
}

impl Ipfs {
    /// `timeout` is applied to every request made to the IPFS node.
    pub fn new(api_url: &str, timeout: Duration, logger: Logger) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Unavailable(format!("building Client error: {err}")))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
            logger,
        })
    }

    pub fn from_config(config: &Config, logger: Logger) -> Result<Self, Error> {
        Self::new(&config.ipfs.api_url, config.fetch_timeout(), logger)
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.api_url, command)
    }

    /// Every command of the IPFS HTTP API is a `POST` request.
    async fn call(&self, command: &str, query: &[(&str, &str)]) -> Result<Response, Error> {
        let response = self
            .client
            .post(self.endpoint(command))
            .query(query)
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await
    }

    async fn keys(&self) -> Result<Vec<NameKey>, Error> {
        let response: KeyListResponse = self
            .call("key/list", &[])
            .await?
            .json()
            .await
            .map_err(response_error)?;

        Ok(response.keys.into_iter().map(NameKey::from).collect())
    }

    async fn find_key(&self, name: &ChannelId) -> Result<Option<NameKey>, Error> {
        Ok(self
            .keys()
            .await?
            .into_iter()
            .find(|key| key.name == name.as_str()))
    }
}

#[async_trait]
impl ContentStore for Ipfs {
    async fn store(&self, bytes: Vec<u8>) -> Result<ContentPointer, Error> {
        let part = multipart::Part::bytes(hex::encode(bytes).into_bytes()).file_name("token");
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("add"))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        let added: AddResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(response_error)?;

        let pointer = added
            .hash
            .parse::<ContentPointer>()
            .map_err(|err| Error::InvalidResponse(err.to_string()))?;

        debug!(self.logger, "Stored token"; "cid" => &pointer);

        Ok(pointer)
    }

    async fn fetch(&self, pointer: &ContentPointer) -> Result<Vec<u8>, Error> {
        let text = self
            .call("cat", &[("arg", pointer.as_str())])
            .await
            .map_err(|err| not_found_as(err, pointer.as_str()))?
            .text()
            .await
            .map_err(response_error)?;

        hex::decode(text.trim()).map_err(|err| Error::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl NamingService for Ipfs {
    async fn create_key(&self, name: &ChannelId) -> Result<NameKey, Error> {
        let key: KeyResponse = self
            .call(
                "key/gen",
                &[("arg", name.as_str()), ("type", "rsa"), ("size", "2048")],
            )
            .await?
            .json()
            .await
            .map_err(response_error)?;

        debug!(self.logger, "Created IPNS key"; "channel" => name, "key" => &key.id);

        Ok(key.into())
    }

    async fn key_exists(&self, name: &ChannelId) -> Result<bool, Error> {
        Ok(self.find_key(name).await?.is_some())
    }

    async fn publish(&self, name: &ChannelId, pointer: &ContentPointer) -> Result<(), Error> {
        let path = format!("{}{}", IPFS_PATH_PREFIX, pointer);

        self.call(
            "name/publish",
            &[("arg", path.as_str()), ("key", name.as_str())],
        )
        .await?;

        debug!(self.logger, "Published pointer"; "channel" => name, "cid" => pointer);

        Ok(())
    }

    async fn resolve(&self, name: &ChannelId) -> Result<ContentPointer, Error> {
        let key = self
            .find_key(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("IPNS key {name}")))?;

        let resolved: ResolveResponse = self
            .call("name/resolve", &[("arg", key.id.as_str())])
            .await
            .map_err(|err| not_found_as(err, name.as_str()))?
            .json()
            .await
            .map_err(response_error)?;

        resolved
            .path
            .strip_prefix(IPFS_PATH_PREFIX)
            .unwrap_or(&resolved.path)
            .parse()
            .map_err(|err: primitives::ipfs::Error| Error::InvalidResponse(err.to_string()))
    }
}

fn request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Unavailable(err.to_string())
    }
}

fn response_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::InvalidResponse(err.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.map_err(response_error)?;
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|error| error.message)
        .unwrap_or(body);

    if message.contains("not found") || message.contains("could not resolve") {
        Err(Error::NotFound(message))
    } else {
        Err(Error::Unavailable(format!("{status}: {message}")))
    }
}

/// Replaces the node message of a [`Error::NotFound`] with the missing `what`.
fn not_found_as(err: Error, what: &str) -> Error {
    match err {
        Error::NotFound(_) => Error::NotFound(what.to_string()),
        err => err,
    }
}
