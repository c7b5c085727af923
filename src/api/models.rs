use serde::{Deserialize, Serialize};

use crate::domain::FormatDescriptor;

/// Every backend reply may carry an `error` field that overrides the status code
pub trait BackendReply {
    fn error_message(&self) -> Option<&str>;
}

fn non_empty(error: &Option<String>) -> Option<&str> {
    error.as_deref().map(str::trim).filter(|e| !e.is_empty())
}

/// Request body of `POST /info`
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest<'a> {
    pub url: &'a str,
}

/// Response from the /info endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendReply for InfoResponse {
    fn error_message(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

/// Request body of `POST /download`
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

/// Response from the /download endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadResponse {
    #[serde(default)]
    pub download_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendReply for DownloadResponse {
    fn error_message(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

/// Response from the /progress/{download_id} endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
}

impl BackendReply for ProgressResponse {
    fn error_message(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

/// Response from the /health endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
}

/// Shape of an error body sent along with a non-2xx status
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendReply for ErrorBody {
    fn error_message(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_field_must_be_non_empty() {
        let reply: ProgressResponse = serde_json::from_str(r#"{"error": "  "}"#).unwrap();
        assert_eq!(reply.error_message(), None);

        let reply: InfoResponse = serde_json::from_str(r#"{"error": "unsupported"}"#).unwrap();
        assert_eq!(reply.error_message(), Some("unsupported"));
    }

    #[test]
    fn test_progress_defaults() {
        let reply: ProgressResponse =
            serde_json::from_str(r#"{"status": "Downloading... 40%", "progress": 40}"#).unwrap();
        assert!(!reply.completed);
        assert_eq!(reply.progress, Some(40.0));
        assert!(reply.filename.is_none());
    }

    #[test]
    fn test_download_request_omits_missing_title() {
        let body = serde_json::to_value(DownloadRequest {
            url: "https://youtu.be/abc123",
            format: "best",
            title: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"url": "https://youtu.be/abc123", "format": "best"})
        );
    }
}
