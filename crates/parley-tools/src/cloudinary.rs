use async_trait::async_trait;
use parley_core::{
    ParamType, ParleyError, Result, ToolContext, ToolDeclaration, ToolHandler, ToolInvocation,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::http_client;

pub const UPLOAD_NAME: &str = "uploadImageToCloudinary";
pub const LIST_NAME: &str = "listImagesInCloudinary";

const DEFAULT_FOLDER: &str = "general_uploads";
const LIST_MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Shared Cloudinary REST client used by both image tools.
pub struct CloudinaryApi {
    client: reqwest::Client,
    credentials: Option<CloudinaryCredentials>,
    base_url: String,
}

impl CloudinaryApi {
    pub fn new(credentials: Option<CloudinaryCredentials>) -> Self {
        Self {
            client: http_client(),
            credentials,
            base_url: "https://api.cloudinary.com/v1_1".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn credentials(&self, tool: &str) -> Result<&CloudinaryCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| tool_error(tool, "Cloudinary is not configured on this server"))
    }

    /// Signed upload of a base64 image. Returns `(secure_url, public_id)`.
    pub async fn upload(
        &self,
        data_uri: String,
        folder: &str,
        public_id: Option<&str>,
    ) -> Result<(String, String)> {
        let creds = self.credentials(UPLOAD_NAME)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut signed: Vec<(&str, &str)> = vec![("folder", folder), ("timestamp", &timestamp)];
        if let Some(id) = public_id {
            signed.push(("public_id", id));
        }
        let signature = sign(&signed, &creds.api_secret);

        let mut form = reqwest::multipart::Form::new()
            .text("file", data_uri)
            .text("api_key", creds.api_key.clone())
            .text("signature", signature);
        for (k, v) in signed {
            form = form.text(k.to_string(), v.to_string());
        }

        let url = format!("{}/{}/image/upload", self.base_url, creds.cloud_name);
        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| tool_error(UPLOAD_NAME, format!("upload failed: {e}")))?;

        let data = read_json(resp, UPLOAD_NAME).await?;
        let secure_url = data["secure_url"].as_str().unwrap_or_default().to_string();
        let public_id = data["public_id"].as_str().unwrap_or_default().to_string();
        info!(url = %secure_url, "image uploaded to Cloudinary");
        Ok((secure_url, public_id))
    }

    /// Newest-first listing of images in a folder. Returns `(secure_url, public_id)` pairs.
    pub async fn list(&self, folder: &str) -> Result<Vec<(String, String)>> {
        let creds = self.credentials(LIST_NAME)?;
        let url = format!("{}/{}/resources/search", self.base_url, creds.cloud_name);
        let body = json!({
            "expression": format!("folder={folder}"),
            "sort_by": [{ "public_id": "desc" }],
            "max_results": LIST_MAX_RESULTS,
        });

        let resp = self
            .client
            .post(url)
            .basic_auth(&creds.api_key, Some(&creds.api_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| tool_error(LIST_NAME, format!("search request failed: {e}")))?;

        let data = read_json(resp, LIST_NAME).await?;
        Ok(data["resources"]
            .as_array()
            .map(|resources| {
                resources
                    .iter()
                    .map(|r| {
                        (
                            r["secure_url"].as_str().unwrap_or_default().to_string(),
                            r["public_id"].as_str().unwrap_or_default().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Decode a Cloudinary response, surfacing `{"error": {"message"}}` bodies.
async fn read_json(resp: reqwest::Response, tool: &str) -> Result<Value> {
    let status = resp.status();
    let data: Value = resp
        .json()
        .await
        .map_err(|e| tool_error(tool, format!("unreadable Cloudinary response: {e}")))?;
    if let Some(msg) = data["error"]["message"].as_str() {
        warn!(tool, %status, error = msg, "Cloudinary API error");
        return Err(tool_error(tool, msg.to_string()));
    }
    if !status.is_success() {
        return Err(tool_error(tool, format!("Cloudinary returned HTTP {status}")));
    }
    Ok(data)
}

/// Cloudinary request signature: sorted `k=v` pairs joined with `&`,
/// the API secret appended, SHA-1, lowercase hex.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let digest = ring::digest::digest(
        &ring::digest::SHA1_FOR_LEGACY_USE_ONLY,
        format!("{to_sign}{api_secret}").as_bytes(),
    );
    digest.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

// ── Upload tool ────────────────────────────────────────────────

/// Uploads the image attached to the current user turn.
pub struct UploadImageTool {
    api: Arc<CloudinaryApi>,
}

impl UploadImageTool {
    pub fn new(api: Arc<CloudinaryApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolHandler for UploadImageTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            UPLOAD_NAME,
            "Upload the image the user attached to the connected Cloudinary account. You are fully authorised to do this. Returns the public URL of the image on success.",
        )
        .param(
            "folder",
            ParamType::String,
            "Cloudinary folder to store the image in. If the user does not name one, use 'general_uploads'.",
            true,
        )
        .param(
            "public_id",
            ParamType::String,
            "Unique file name for the image. Leave empty to have one generated.",
            false,
        )
    }

    async fn invoke(&self, inv: &ToolInvocation, ctx: &ToolContext) -> Result<Value> {
        let attachment = ctx.attachment.as_ref().filter(|a| a.is_image()).ok_or_else(|| {
            tool_error(
                UPLOAD_NAME,
                "no image was provided to upload; tell the user to attach an image first",
            )
        })?;
        // Reject payloads that are not valid base64 before they leave the process.
        attachment
            .decode()
            .map_err(|e| tool_error(UPLOAD_NAME, e.to_string()))?;

        let folder = non_empty(inv.str_arg("folder")).unwrap_or(DEFAULT_FOLDER);
        let public_id = non_empty(inv.str_arg("public_id"));
        debug!(session = %ctx.session_id, folder, "uploading image");

        let (url, public_id) = self
            .api
            .upload(attachment.data_uri(), folder, public_id)
            .await?;
        Ok(json!({ "success": true, "url": url, "public_id": public_id }))
    }
}

// ── List tool ──────────────────────────────────────────────────

pub struct ListImagesTool {
    api: Arc<CloudinaryApi>,
}

impl ListImagesTool {
    pub fn new(api: Arc<CloudinaryApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolHandler for ListImagesTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            LIST_NAME,
            "List the most recent images stored in a Cloudinary folder.",
        )
        .param(
            "folder",
            ParamType::String,
            "Name of the Cloudinary folder to look in. Required.",
            true,
        )
    }

    async fn invoke(&self, inv: &ToolInvocation, _ctx: &ToolContext) -> Result<Value> {
        let folder = non_empty(inv.str_arg("folder"))
            .ok_or_else(|| tool_error(LIST_NAME, "a folder name is required"))?;

        let images = self.api.list(folder).await.map_err(|e| match e {
            ParleyError::ToolExecution { reason, .. } if reason.contains("Folder not found") => {
                tool_error(LIST_NAME, format!("folder '{folder}' was not found in Cloudinary"))
            }
            other => other,
        })?;

        if images.is_empty() {
            return Ok(json!({
                "success": true,
                "message": format!("No images were found in folder '{folder}'."),
            }));
        }
        let images: Vec<Value> = images
            .into_iter()
            .map(|(url, public_id)| json!({ "url": url, "public_id": public_id }))
            .collect();
        Ok(json!({ "success": true, "count": images.len(), "images": images }))
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn tool_error(tool: &str, reason: impl Into<String>) -> ParleyError {
    ParleyError::ToolExecution {
        tool: tool.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_params() {
        // sha1("folder=a&timestamp=1" + "s")
        let a = sign(&[("timestamp", "1"), ("folder", "a")], "s");
        let b = sign(&[("folder", "a"), ("timestamp", "1")], "s");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sign_known_vector() {
        // Documented example: public_id=sample_image&timestamp=1315060510 + abcd
        let sig = sign(
            &[("timestamp", "1315060510"), ("public_id", "sample_image")],
            "abcd",
        );
        assert_eq!(sig, "b4ad47fb4e25c7bf5f92a20089f9db59bc302313");
    }

    #[tokio::test]
    async fn test_upload_without_attachment_fails() {
        let tool = UploadImageTool::new(Arc::new(CloudinaryApi::new(None)));
        let inv = ToolInvocation {
            name: UPLOAD_NAME.into(),
            arguments: json!({"folder": "trips"}),
        };
        let err = tool.invoke(&inv, &ToolContext::default()).await.unwrap_err();
        assert!(err.to_string().contains("no image"));
    }

    #[tokio::test]
    async fn test_unconfigured_list_fails() {
        let tool = ListImagesTool::new(Arc::new(CloudinaryApi::new(None)));
        let inv = ToolInvocation {
            name: LIST_NAME.into(),
            arguments: json!({"folder": "trips"}),
        };
        let err = tool.invoke(&inv, &ToolContext::default()).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_list_requires_folder() {
        let tool = ListImagesTool::new(Arc::new(CloudinaryApi::new(None)));
        let inv = ToolInvocation {
            name: LIST_NAME.into(),
            arguments: json!({}),
        };
        let err = tool.invoke(&inv, &ToolContext::default()).await.unwrap_err();
        assert!(err.to_string().contains("folder name is required"));
    }
}
