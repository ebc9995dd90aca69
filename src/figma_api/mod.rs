mod rest;

use std::{collections::HashMap, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::document::{FigmaFile, ImageFormat};

pub use self::rest::RestClient;

pub const DEFAULT_API_URL: &str = "https://api.figma.com/v1";

/// Link to the file in the Figma web app, for status output.
pub fn file_url(file_key: &str) -> String {
    format!("https://www.figma.com/file/{}/", file_key)
}

#[derive(Clone, Debug)]
pub struct FigmaCredentials {
    pub token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// One batched render: every id shares the same format and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub ids: Vec<String>,
    pub format: ImageFormat,
    pub scale: f64,
}

/// What the images endpoint returns. A node that could not be rendered is
/// either missing from `images` or mapped to `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderResponse {
    #[serde(default)]
    pub err: Option<String>,

    #[serde(default)]
    pub images: HashMap<String, Option<String>>,
}

impl RenderResponse {
    pub fn url_for(&self, id: &str) -> Option<&str> {
        self.images.get(id).and_then(|url| url.as_deref())
    }
}

#[async_trait]
pub trait FigmaApiClient: Send + Sync {
    async fn get_file(&self, file_key: &str) -> Result<FigmaFile>;

    async fn get_image_urls(&self, file_key: &str, request: &RenderRequest)
        -> Result<RenderResponse>;
}

#[derive(Debug, Error)]
pub enum FigmaApiError {
    #[error("Figma API HTTP error")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Figma API error (HTTP {status}): {message}")]
    ApiError { status: StatusCode, message: String },

    #[error("Figma API returned success, but had malformed JSON response: {body}")]
    BadResponseJson {
        body: String,
        source: serde_json::Error,
    },

    #[error("Figma API returned HTTP {status} with body: {body}")]
    ResponseError { status: StatusCode, body: String },

    #[error("No Figma token was given. Pass --token or set the FIGMA_TOKEN environment variable")]
    MissingAuth,
}

pub fn get_client(
    credentials: FigmaCredentials,
    config: ClientConfig,
) -> Result<Box<dyn FigmaApiClient>> {
    match credentials.token {
        Some(token) => Ok(Box::new(RestClient::new(token, config)?)),
        None => bail!(FigmaApiError::MissingAuth),
    }
}
