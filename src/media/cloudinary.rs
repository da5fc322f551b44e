use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{AssetKind, Blob, MediaRelay, UploadedAsset};
use crate::error::{Error, Result};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Signed uploads to a Cloudinary account.
pub struct CloudinaryRelay {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryRelay {
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    fn endpoint(&self, kind: AssetKind, action: &str) -> String {
        format!("{API_BASE}/{}/{}/{action}", self.cloud_name, resource_type(kind))
    }

    fn signed_form(&self, params: &[(&str, String)]) -> Form {
        let signature = sign(params, &self.api_secret);
        params
            .iter()
            .fold(Form::new(), |form, (k, v)| form.text(k.to_string(), v.clone()))
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, url: String, form: Form) -> Result<T> {
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Upstream(format!("cloudinary returned {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| Error::Upstream(e.to_string()))
    }
}

#[async_trait]
impl MediaRelay for CloudinaryRelay {
    async fn upload(&self, blob: Blob, kind: AssetKind) -> Result<UploadedAsset> {
        let timestamp = Utc::now().timestamp().to_string();
        let mut part = Part::bytes(blob.bytes.to_vec());
        if let Some(name) = blob.file_name {
            part = part.file_name(name);
        }
        let form = self.signed_form(&[("timestamp", timestamp)]).part("file", part);

        let uploaded: UploadResponse = self.send(self.endpoint(kind, "upload"), form).await?;
        tracing::debug!("Uploaded {} to cloudinary", uploaded.public_id);

        Ok(UploadedAsset {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            duration_seconds: uploaded.duration,
        })
    }

    async fn destroy(&self, public_id: &str, kind: AssetKind) -> Result<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let form = self.signed_form(&[
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
        ]);

        let resp: DestroyResponse = self.send(self.endpoint(kind, "destroy"), form).await?;
        match resp.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(Error::Upstream(format!("destroy {public_id}: {other}"))),
        }
    }
}

/// Audio lives under Cloudinary's `video` resource type.
fn resource_type(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Audio => "video",
        AssetKind::Image => "image",
    }
}

/// Params sorted by key, joined as `k=v&k=v`, with the secret appended.
fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
