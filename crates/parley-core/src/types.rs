use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Opaque key identifying a conversation. Telegram uses the chat id, the web
/// surface uses a caller-supplied or server-generated id.
pub type SessionId = String;

/// A binary attachment carried alongside a user turn, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    /// Base64 payload without a `data:` prefix.
    pub data: String,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Build an attachment from raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )
    }

    /// Decode the payload back into bytes.
    pub fn decode(&self) -> crate::Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| crate::ParleyError::Other(anyhow::anyhow!("invalid base64 attachment: {e}")))
    }

    /// `data:` URI form, accepted by upload APIs in place of a file.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
