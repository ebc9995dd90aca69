use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};

use super::{ClientConfig, FigmaApiClient, FigmaApiError, RenderRequest, RenderResponse};
use crate::document::FigmaFile;

/// Error bodies look like `{"status": 403, "err": "Invalid token"}`.
#[derive(Debug, Deserialize)]
struct RawErrorResponse {
    err: Option<String>,
    message: Option<String>,
}

pub struct RestClient {
    token: SecretString,
    base_url: String,
    client: Client,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "RestClient({})", self.base_url)
    }
}

impl RestClient {
    pub fn new(token: SecretString, config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            token,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client: builder.build().map_err(FigmaApiError::from)?,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        log::trace!("GET {}", url);

        self.client
            .get(url)
            .header("X-Figma-Token", self.token.expose_secret().as_str())
    }

    /// Sends a request and decodes a JSON body, turning HTTP failures and
    /// API-reported errors into a [`FigmaApiError`].
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.execute_with(request, |body| serde_json::from_str(body))
            .await
    }

    async fn execute_with<T>(
        &self,
        request: RequestBuilder,
        decode: impl FnOnce(&str) -> serde_json::Result<T>,
    ) -> Result<T> {
        let response = request.send().await.map_err(FigmaApiError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(FigmaApiError::from)?;

        if !status.is_success() {
            return Err(error_from_body(status, body).into());
        }

        match decode(&body) {
            Ok(value) => Ok(value),
            Err(source) => Err(FigmaApiError::BadResponseJson { body, source }.into()),
        }
    }
}

fn error_from_body(status: StatusCode, body: String) -> FigmaApiError {
    match serde_json::from_str::<RawErrorResponse>(&body) {
        Ok(RawErrorResponse {
            err: Some(message), ..
        })
        | Ok(RawErrorResponse {
            message: Some(message),
            ..
        }) => FigmaApiError::ApiError { status, message },
        _ => FigmaApiError::ResponseError { status, body },
    }
}

#[async_trait]
impl FigmaApiClient for RestClient {
    async fn get_file(&self, file_key: &str) -> Result<FigmaFile> {
        self.execute_with(self.get(&format!("/files/{}", file_key)), FigmaFile::from_json)
            .await
    }

    async fn get_image_urls(
        &self,
        file_key: &str,
        request: &RenderRequest,
    ) -> Result<RenderResponse> {
        let query = [
            ("ids", request.ids.join(",")),
            ("format", request.format.to_string()),
            ("scale", request.scale.to_string()),
        ];

        let response = self
            .execute::<RenderResponse>(self.get(&format!("/images/{}", file_key)).query(&query))
            .await;

        // The images endpoint reports render failures such as timeouts with a
        // non-success status and an `err` field. Hand that back as a response
        // so callers see the API's own message.
        match response {
            Err(err) => match err.downcast::<FigmaApiError>() {
                Ok(FigmaApiError::ApiError { message, .. }) => Ok(RenderResponse {
                    err: Some(message),
                    ..RenderResponse::default()
                }),
                Ok(other) => Err(other.into()),
                Err(err) => Err(err),
            },
            ok => ok,
        }
    }
}

#[cfg(test)]
mod test {
    use httpmock::MockServer;

    use super::*;
    use crate::document::ImageFormat;

    fn client(server: &MockServer) -> RestClient {
        RestClient::new(
            SecretString::new("secret".to_owned()),
            ClientConfig {
                base_url: server.base_url(),
                timeout: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn get_file_sends_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/files/abc")
                    .header("X-Figma-Token", "secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"name": "Icons", "document": {"id": "0:0", "type": "DOCUMENT", "children": []}}"#);
            })
            .await;

        let file = client(&server).get_file("abc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(file.name, "Icons");
        assert_eq!(file.document.id, "0:0");
    }

    #[tokio::test]
    async fn get_file_keeps_response_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/files/abc");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"name": "Icons", "thumbnailUrl": "http://x/thumb.png", "document": {"id": "0:0", "type": "DOCUMENT"}}"#);
            })
            .await;

        let file = client(&server).get_file("abc").await.unwrap();

        assert_eq!(file.raw["thumbnailUrl"], "http://x/thumb.png");
    }

    #[tokio::test]
    async fn get_file_surfaces_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/files/abc");
                then.status(403)
                    .header("content-type", "application/json")
                    .body(r#"{"status": 403, "err": "Invalid token"}"#);
            })
            .await;

        let err = client(&server).get_file("abc").await.unwrap_err();

        match err.downcast_ref::<FigmaApiError>() {
            Some(FigmaApiError::ApiError { status, message }) => {
                assert_eq!(*status, StatusCode::FORBIDDEN);
                assert_eq!(message, "Invalid token");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_file_rejects_malformed_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/files/abc");
                then.status(200).body("not json");
            })
            .await;

        let err = client(&server).get_file("abc").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FigmaApiError>(),
            Some(FigmaApiError::BadResponseJson { .. })
        ));
    }

    #[tokio::test]
    async fn get_image_urls_batches_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/images/abc")
                    .query_param("ids", "1:1,1:2")
                    .query_param("format", "png")
                    .query_param("scale", "2");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"err": null, "images": {"1:1": "http://x/1.png", "1:2": "http://x/2.png"}}"#);
            })
            .await;

        let request = RenderRequest {
            ids: vec!["1:1".to_owned(), "1:2".to_owned()],
            format: ImageFormat::Png,
            scale: 2.0,
        };
        let response = client(&server).get_image_urls("abc", &request).await.unwrap();

        mock.assert_async().await;
        assert!(response.err.is_none());
        assert_eq!(response.url_for("1:2"), Some("http://x/2.png"));
    }

    #[tokio::test]
    async fn get_image_urls_reports_render_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/images/abc");
                then.status(400)
                    .header("content-type", "application/json")
                    .body(r#"{"status": 400, "err": "rate limited"}"#);
            })
            .await;

        let request = RenderRequest {
            ids: vec!["1:1".to_owned()],
            format: ImageFormat::Svg,
            scale: 1.0,
        };
        let response = client(&server).get_image_urls("abc", &request).await.unwrap();

        assert_eq!(response.err.as_deref(), Some("rate limited"));
        assert!(response.images.is_empty());
    }
}
