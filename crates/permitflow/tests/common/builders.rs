//! Builders for test inputs.

#![allow(dead_code)]

use permitflow::config::PermitTypeSeed;
use permitflow::EvidenceUpload;

/// Builder for `EvidenceUpload` values.
pub struct UploadBuilder {
    filename: String,
    mime_type: Option<String>,
    size: usize,
}

impl UploadBuilder {
    /// A small JPEG photo.
    pub fn photo() -> Self {
        Self {
            filename: "foto.jpg".to_string(),
            mime_type: Some("image/jpeg".to_string()),
            size: 1024,
        }
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    pub fn mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    /// Leave the type to be guessed from the filename.
    pub fn without_mime_type(mut self) -> Self {
        self.mime_type = None;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn build(self) -> EvidenceUpload {
        EvidenceUpload {
            filename: self.filename,
            mime_type: self.mime_type,
            bytes: vec![0xAB; self.size],
        }
    }
}

/// Builder for configuration JSON documents.
pub struct ConfigJsonBuilder {
    database_path: Option<String>,
    max_size_bytes: Option<u64>,
    permit_types: Vec<PermitTypeSeed>,
}

impl ConfigJsonBuilder {
    pub fn new() -> Self {
        Self {
            database_path: None,
            max_size_bytes: None,
            permit_types: Vec::new(),
        }
    }

    pub fn database_path(mut self, path: &str) -> Self {
        self.database_path = Some(path.to_string());
        self
    }

    pub fn max_size_bytes(mut self, max: u64) -> Self {
        self.max_size_bytes = Some(max);
        self
    }

    pub fn permit_type(mut self, name: &str, rank: u32) -> Self {
        self.permit_types
            .push(PermitTypeSeed::new(name, &format!("Permiso de {}", name), rank));
        self
    }

    pub fn build(self) -> String {
        let mut root = serde_json::json!({ "version": "1.0" });
        if let Some(path) = self.database_path {
            root["databasePath"] = serde_json::json!(path);
        }
        if let Some(max) = self.max_size_bytes {
            root["evidence"] = serde_json::json!({ "maxSizeBytes": max });
        }
        if !self.permit_types.is_empty() {
            root["permitTypes"] = serde_json::to_value(&self.permit_types).unwrap();
        }
        root.to_string()
    }
}
