//! # parley-tools
//!
//! The tool registry and the built-in tools offered to the model:
//! current weather, web search, and Cloudinary image upload/listing.

pub mod cloudinary;
pub mod registry;
pub mod search;
pub mod weather;

use std::sync::Arc;

use parley_config::ServicesConfig;
use parley_core::Result;

pub use cloudinary::{CloudinaryApi, CloudinaryCredentials, ListImagesTool, UploadImageTool};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use search::WebSearchTool;
pub use weather::WeatherTool;

pub(crate) const USER_AGENT: &str = concat!("parley/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by the built-in tools. Per-call deadlines are enforced
/// by the engine; this only bounds connection setup.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Registry with every built-in tool. Tools whose credentials are missing are
/// still declared and report "not configured" when invoked.
pub fn default_registry(services: &ServicesConfig) -> Result<ToolRegistry> {
    let credentials = match (
        &services.cloudinary_cloud_name,
        &services.cloudinary_api_key,
        &services.cloudinary_api_secret,
    ) {
        (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryCredentials {
            cloud_name: cloud_name.clone(),
            api_key: api_key.clone(),
            api_secret: api_secret.clone(),
        }),
        _ => None,
    };
    let cloudinary = Arc::new(CloudinaryApi::new(credentials));

    ToolRegistry::builder()
        .register(WeatherTool::new())
        .register(WebSearchTool::new(
            services.google_search_api_key.clone(),
            services.google_cse_id.clone(),
        ))
        .register(UploadImageTool::new(Arc::clone(&cloudinary)))
        .register(ListImagesTool::new(cloudinary))
        .build()
}
