//! File listing and upload types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File record as returned by `GET /files` and the upload endpoint.
///
/// The backend stores objects in S3-compatible storage; `storage_key` is the
/// object key. Older backend revisions emit `file_name` instead of `name`,
/// hence the alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "file_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response shape of `GET /files/:name`: the backend answers with a
/// presigned URL rather than the file bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct FileDownload {
    pub url: String,
    #[serde(default)]
    pub download: bool,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_response_shape() {
        let json = serde_json::json!({
            "id": "f1",
            "name": "a.txt",
            "storage_key": "k1"
        });
        let file: StoredFile = serde_json::from_value(json).expect("file should parse");
        assert_eq!(file.id.as_deref(), Some("f1"));
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.storage_key.as_deref(), Some("k1"));
        assert!(file.file_size.is_none());
    }

    #[test]
    fn accepts_legacy_file_name_field() {
        let json = serde_json::json!({
            "file_name": "report.pdf",
            "file_size": 2048,
            "file_type": "application/pdf"
        });
        let file: StoredFile = serde_json::from_value(json).expect("file should parse");
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.file_size, Some(2048));
    }

    #[test]
    fn parses_download_response() {
        let json = serde_json::json!({
            "url": "https://storage.example/k1?sig=abc",
            "download": true,
            "expires_in": 3600
        });
        let download: FileDownload = serde_json::from_value(json).expect("should parse");
        assert!(download.download);
        assert_eq!(download.expires_in, Some(3600));
    }
}
