//! HTTP client for the Ark generation API.
//!
//! Every call returns either a fully parsed success value or a classified
//! [`ApiError`]; partially parsed responses never escape. Nothing is retried:
//! a resubmitted create call starts a new remote job.

use anyhow::Result;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{ApiError, classify_response, classify_transport};
use crate::logging;

// === Types ===

/// Raw bytes fetched from a URL along with the reported content type.
#[derive(Debug, Clone)]
pub struct BinaryPayload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Authenticated client for the Ark API.
#[derive(Clone)]
#[must_use]
pub struct ArkClient {
    http_client: reqwest::Client,
    base_url: String,
}

// === ArkClient ===

impl ArkClient {
    /// Create a client from configuration. Fails when no API key is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.ark_api_key()?;
        let base_url = config.ark_base_url();

        logging::info(format!("Ark base URL: {base_url}"));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// POST a JSON body to an API endpoint and decode the JSON reply.
    pub async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(endpoint);
        let response = self.send(self.http_client.post(&url).json(body)).await?;
        response.json::<T>().await.map_err(|e| classify_transport(&e))
    }

    /// POST a JSON body and return the reply as text (used for event streams).
    pub async fn post_text<B>(&self, endpoint: &str, body: &B) -> Result<String, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(endpoint);
        let response = self.send(self.http_client.post(&url).json(body)).await?;
        response.text().await.map_err(|e| classify_transport(&e))
    }

    /// GET an API endpoint and decode the JSON reply.
    pub async fn get_json<T>(&self, endpoint: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.url_for(endpoint);
        let response = self.send(self.http_client.get(&url)).await?;
        response.json::<T>().await.map_err(|e| classify_transport(&e))
    }

    /// Fetch raw bytes from an absolute URL or an API-relative endpoint.
    ///
    /// The bearer credential is attached either way.
    pub async fn get_bytes(&self, endpoint_or_url: &str) -> Result<BinaryPayload, ApiError> {
        let url = self.url_for(endpoint_or_url);
        let response = self.send(self.http_client.get(&url)).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(std::string::ToString::to_string);
        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        Ok(BinaryPayload {
            bytes,
            content_type,
        })
    }

    fn url_for(&self, endpoint_or_url: &str) -> String {
        if endpoint_or_url.starts_with("http://") || endpoint_or_url.starts_with("https://") {
            endpoint_or_url.to_string()
        } else {
            format!("{}{}", self.base_url, endpoint_or_url)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            let classified = classify_transport(&e);
            logging::warn(format!("Request failed: {e} ({})", classified.code));
            classified
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("(failed to read body: {e})"));
        let classified = classify_response(status, &body);
        logging::warn(format!(
            "HTTP {} from Ark API: {} ({})",
            status.as_u16(),
            classified.message,
            classified.code
        ));
        Err(classified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorCode;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for_base_url(base_url: String) -> ArkClient {
        let config = Config {
            api_key: Some("test".to_string()),
            base_url: Some(base_url),
            ..Config::default()
        };
        ArkClient::new(&config).expect("create client")
    }

    #[test]
    fn new_requires_api_key() {
        assert!(ArkClient::new(&Config::default()).is_err());
    }

    #[tokio::test]
    async fn post_json_sends_bearer_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/echo"))
            .and(header("authorization", "Bearer test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for_base_url(server.uri());
        let value: Value = client
            .post_json("/api/v3/echo", &json!({ "a": 1 }))
            .await
            .expect("post");
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn unauthorized_envelope_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/contents/generations/tasks/abc"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": "UNAUTHORIZED", "message": "bad key" }
            })))
            .mount(&server)
            .await;

        let client = client_for_base_url(server.uri());
        let err = client
            .get_json::<Value>("/api/v3/contents/generations/tasks/abc")
            .await
            .unwrap_err();
        assert_eq!(err.code, ApiErrorCode::Unauthorized);
        assert_eq!(err.message, "bad key");
        assert_eq!(err.status_code, Some(401));
    }

    #[tokio::test]
    async fn connection_failure_is_network_error() {
        // Nothing listens on port 1.
        let client = client_for_base_url("http://127.0.0.1:1".to_string());
        let err = client
            .get_json::<Value>("/api/v3/contents/generations/tasks/abc")
            .await
            .unwrap_err();
        assert_eq!(err.code, ApiErrorCode::NetworkError);
        assert!(err.status_code.is_none());
    }

    #[tokio::test]
    async fn undecodable_success_body_is_unknown_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for_base_url(server.uri());
        let err = client
            .get_json::<Value>("/api/v3/broken")
            .await
            .unwrap_err();
        assert_eq!(err.code, ApiErrorCode::Unknown);
    }

    #[tokio::test]
    async fn get_bytes_accepts_absolute_urls_and_reports_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/cat.png"))
            .and(header("authorization", "Bearer test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"PNGDATA".to_vec()),
            )
            .mount(&server)
            .await;

        let client = client_for_base_url("https://unused.invalid".to_string());
        let payload = client
            .get_bytes(&format!("{}/files/cat.png", server.uri()))
            .await
            .expect("bytes");
        assert_eq!(payload.bytes.as_ref(), b"PNGDATA");
        assert_eq!(payload.content_type.as_deref(), Some("image/png"));
    }
}
