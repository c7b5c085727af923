use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::models::{
    BackendReply, DownloadRequest, DownloadResponse, ErrorBody, HealthResponse, InfoRequest,
    InfoResponse, ProgressResponse,
};
use crate::config::ApiConfig;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    Backend(String),

    #[error("HTTP error! status: {status}")]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Text shown to the user for this failure. Messages written by the
    /// backend pass through untouched; everything else reads as a network error.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Backend(message) => message.clone(),
            ApiError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Status {
                status,
                message: None,
            } => format!("Network error: HTTP {}", status.as_u16()),
            ApiError::RequestError(e) => format!("Network error: {}", e),
            ApiError::InvalidResponse(detail) => {
                format!("Network error: malformed response ({})", detail)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.config.base_url, route)
    }

    /// `{base}/{route}/{id}` with the id escaped as a single path segment
    fn job_endpoint(&self, route: &str, id: &str) -> String {
        match Url::parse(&self.config.base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(route).push(id);
                }
                url.to_string()
            }
            Err(_) => format!("{}/{}/{}", self.config.base_url, route, id),
        }
    }

    /// Decode a JSON reply, treating non-2xx statuses and `error` fields as failures
    async fn read_reply<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned + BackendReply,
    {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_message().map(str::to_string));
            return Err(ApiError::Status { status, message });
        }

        let reply: T = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        if let Some(message) = reply.error_message() {
            return Err(ApiError::Backend(message.to_string()));
        }

        Ok(reply)
    }

    /// Fetch title, thumbnail and available formats for a media URL
    pub async fn get_media_info(&self, media_url: &str) -> Result<InfoResponse> {
        debug!("POST /info for {}", media_url);
        let response = self
            .http
            .post(self.endpoint("info"))
            .json(&InfoRequest { url: media_url })
            .send()
            .await?;

        Self::read_reply(response).await
    }

    /// Create a download job and return its id
    pub async fn create_download(
        &self,
        media_url: &str,
        format: &str,
        title: Option<&str>,
    ) -> Result<String> {
        debug!("POST /download for {} (format {})", media_url, format);
        let response = self
            .http
            .post(self.endpoint("download"))
            .json(&DownloadRequest {
                url: media_url,
                format,
                title,
            })
            .send()
            .await?;

        let reply: DownloadResponse = Self::read_reply(response).await?;
        reply
            .download_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("missing download_id".to_string()))
    }

    pub async fn get_progress(&self, download_id: &str) -> Result<ProgressResponse> {
        let response = self
            .http
            .get(self.job_endpoint("progress", download_id))
            .send()
            .await?;

        Self::read_reply(response).await
    }

    /// Where the finished file of a job can be fetched from
    pub fn file_url(&self, download_id: &str) -> String {
        self.job_endpoint("file", download_id)
    }

    /// Stream the finished file of a job
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_id: &str,
    ) -> Result<(Option<u64>, BoxStream<'static, Result<bytes::Bytes>>)> {
        let response = self.http.get(self.file_url(download_id)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error_message().map(str::to_string));
            return Err(ApiError::Status { status, message });
        }

        let total_size = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(ApiError::RequestError)
            .boxed();

        Ok((total_size, stream))
    }

    /// Ask the backend whether it is up
    pub async fn health(&self) -> Result<bool> {
        let response = self.http.get(self.endpoint("health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                message: None,
            });
        }

        let reply: HealthResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        Ok(reply.status == "healthy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(ApiConfig::with_base_url(base)).unwrap()
    }

    #[test]
    fn test_job_endpoint_escapes_id() {
        let client = client("https://host.example/api");
        assert_eq!(
            client.file_url("abc-123"),
            "https://host.example/api/file/abc-123"
        );
        assert_eq!(
            client.job_endpoint("progress", "a/b"),
            "https://host.example/api/progress/a%2Fb"
        );
    }

    #[test]
    fn test_job_endpoint_on_bare_host() {
        let client = client("http://127.0.0.1:4000");
        assert_eq!(client.file_url("xyz"), "http://127.0.0.1:4000/file/xyz");
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            ApiError::Backend("unsupported".into()).user_message(),
            "unsupported"
        );
        assert_eq!(
            ApiError::Status {
                status: StatusCode::NOT_FOUND,
                message: Some("Download not found".into()),
            }
            .user_message(),
            "Download not found"
        );
        assert_eq!(
            ApiError::Status {
                status: StatusCode::BAD_GATEWAY,
                message: None,
            }
            .user_message(),
            "Network error: HTTP 502"
        );
        assert!(ApiError::InvalidResponse("eof".into())
            .user_message()
            .starts_with("Network error"));
    }
}
