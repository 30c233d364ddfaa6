//! Media sideloading through the WordPress REST API.
//!
//! Each image is downloaded from its legacy URL and uploaded to
//! `POST {rest_url}/wp/v2/media` as a raw body, with the parent post and
//! title passed as query parameters. WordPress then stores the file under
//! the uploads directory and generates the intermediate image sizes.
//!
//! # Environment Variables
//!
//! - `WP_APP_PASSWORD`: application password for `site.username` (required)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

use crate::config::SiteConfig;

use super::MediaImporter;

/// Uploads media with basic auth against an application password.
pub struct RestMediaImporter {
    client: reqwest::Client,
    rest_url: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct CreatedMedia {
    id: u64,
}

#[derive(Deserialize)]
struct RestError {
    code: String,
    message: String,
}

#[derive(Deserialize)]
struct CurrentUser {
    name: String,
}

impl RestMediaImporter {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let rest_url = site
            .rest_url
            .clone()
            .context("site.rest_url must be set to sideload images")?;
        let username = site
            .username
            .clone()
            .context("site.username must be set to sideload images")?;
        let password = std::env::var("WP_APP_PASSWORD")
            .context("WP_APP_PASSWORD environment variable not set")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(site.timeout_secs))
            .user_agent(concat!("escape-ngg/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            rest_url: rest_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.rest_url, path)
    }
}

#[async_trait]
impl MediaImporter for RestMediaImporter {
    async fn sideload(&self, url: &str, parent: u64, title: &str) -> Result<u64> {
        let download = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        let status = download.status();
        if !status.is_success() {
            bail!("HTTP {} fetching {}", status, url);
        }

        let filename = file_name_from_url(url);
        let content_type = download
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime(&filename).to_string());
        let bytes = download
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        tracing::debug!(url, parent, size = bytes.len(), "uploading media");
        let upload = self
            .client
            .post(self.endpoint("wp/v2/media"))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("post", parent.to_string()), ("title", title.to_string())])
            .header(CONTENT_TYPE, content_type)
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            )
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", filename))?;

        let status = upload.status();
        if !status.is_success() {
            let body = upload.text().await.unwrap_or_default();
            bail!(
                "media upload of {} failed: HTTP {}: {}",
                filename,
                status,
                describe_rest_error(&body)
            );
        }

        let created: CreatedMedia = upload
            .json()
            .await
            .context("Failed to parse media upload response")?;
        Ok(created.id)
    }

    async fn check(&self) -> Result<String> {
        let response = self
            .client
            .get(self.endpoint("wp/v2/users/me"))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .context("Failed to reach the REST API")?;
        let status = response.status();
        if !status.is_success() {
            bail!("REST API authentication failed: HTTP {}", status);
        }
        let user: CurrentUser = response
            .json()
            .await
            .context("Failed to parse users/me response")?;
        Ok(user.name)
    }
}

/// WordPress error bodies look like `{"code": "...", "message": "..."}`.
/// Anything else is passed through as-is.
fn describe_rest_error(body: &str) -> String {
    match serde_json::from_str::<RestError>(body) {
        Ok(err) => format!("{} ({})", err.message, err.code),
        Err(_) => body.trim().to_string(),
    }
}

/// Last path segment of a URL, without query string or fragment.
fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("image")
        .to_string()
}

fn guess_mime(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
