use std::collections::HashMap;

use axum::extract::Multipart;

use super::response::ApiError;
use crate::media::Blob;

pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// A multipart body split into text fields and file fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Blob>,
}

impl UploadForm {
    pub async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read {name}: {e}")))?;
                if bytes.len() > MAX_UPLOAD_SIZE {
                    return Err(ApiError::payload_too_large(format!(
                        "File size ({} bytes) exceeds maximum allowed size ({MAX_UPLOAD_SIZE} bytes)",
                        bytes.len()
                    )));
                }
                if !bytes.is_empty() {
                    form.files.insert(
                        name,
                        Blob {
                            bytes,
                            file_name: Some(file_name),
                        },
                    );
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read {name}: {e}")))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Non-blank text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<Blob> {
        self.files.remove(name)
    }
}
