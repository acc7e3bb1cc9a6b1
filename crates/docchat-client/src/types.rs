//! Wire types exchanged with the backend

use serde::{Deserialize, Serialize};

/// A document as the backend reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileEntry {
    /// Original file name the document was uploaded under
    pub filename: String,
    /// Server-assigned identifier
    #[serde(rename = "uuid")]
    pub id: String,
}

impl RemoteFileEntry {
    pub fn new(filename: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            id: id.into(),
        }
    }
}

/// Response body of `GET /documents`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<RemoteFileEntry>,
}

/// One `file` part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub filename: String,
    pub content: Vec<u8>,
    pub mime: &'static str,
}

/// Response body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AskRequest<'a> {
    pub query: &'a str,
}

/// Response body of `POST /ask`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_list_maps_uuid_to_id() {
        let json = r#"{"files":[{"filename":"a.txt","uuid":"5f1c"},{"filename":"b.md","uuid":"77aa"}]}"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(
            list.files,
            vec![
                RemoteFileEntry::new("a.txt", "5f1c"),
                RemoteFileEntry::new("b.md", "77aa"),
            ]
        );
    }

    #[test]
    fn test_file_list_tolerates_missing_files_key() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }

    #[test]
    fn test_ask_response_without_sources() {
        let resp: AskResponse = serde_json::from_str(r#"{"answer":"42"}"#).unwrap();
        assert_eq!(resp.answer, "42");
        assert!(resp.sources.is_empty());
    }

    #[test]
    fn test_health_status_case_insensitive() {
        let health: HealthStatus = serde_json::from_str(r#"{"status":"OK"}"#).unwrap();
        assert!(health.is_ok());
    }
}
