//! Storage and import abstractions consumed by the migration driver.
//!
//! WordPress is reached through three seams:
//!
//! - [`ContentStore`]: posts, attachments and their meta.
//! - [`LegacyStore`]: read-only NextGen Gallery tables.
//! - [`MediaImporter`]: fetching a URL and registering it as an attachment.
//!
//! [`mysql::WordPressDb`] implements the first two over the WordPress
//! database, [`rest::RestMediaImporter`] implements the third over the REST
//! API, and [`memory::InMemoryWordPress`] implements all three for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod mysql;
pub mod rest;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Attachment, AttachmentUpdate, LegacyGallery, LegacyImage, Post, PostQuery};

/// Read/write access to WordPress posts and attachments.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// One page of posts/pages (any status but trash) whose body contains
    /// `query.marker`.
    async fn search_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// Total number of posts matching `marker` and `filter`, ignoring paging.
    async fn count_posts(&self, query: &PostQuery) -> Result<u64>;

    /// Ids of image attachments already parented to `post_id`.
    async fn existing_image_attachments(&self, post_id: u64) -> Result<Vec<u64>>;

    /// Attachments of `parent` whose title, excerpt or content contains `needle`.
    async fn find_attachments(&self, parent: u64, needle: &str) -> Result<Vec<Attachment>>;

    /// Set title, content, menu order and alt text meta on an attachment.
    async fn update_attachment(&self, attachment_id: u64, update: &AttachmentUpdate) -> Result<()>;

    /// Persist a rewritten post body.
    async fn update_post_content(&self, post_id: u64, content: &str) -> Result<()>;

    /// Called after every batch; drop anything accumulated while processing it.
    async fn end_batch(&self) -> Result<()> {
        Ok(())
    }
}

/// Read-only access to the NextGen Gallery tables.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    async fn gallery(&self, gallery_id: u64) -> Result<Option<LegacyGallery>>;

    /// Images of a gallery ordered by sort order, then picture id.
    async fn images(&self, gallery_id: u64) -> Result<Vec<LegacyImage>>;

    /// `(galleries, images)` row counts.
    async fn counts(&self) -> Result<(u64, u64)>;
}

/// Sideloads remote images into the media library.
#[async_trait]
pub trait MediaImporter: Send + Sync {
    /// Fetch `url` and create an attachment under `parent` whose title is
    /// `title`. Returns the new attachment id.
    async fn sideload(&self, url: &str, parent: u64, title: &str) -> Result<u64>;

    /// Verify the importer is reachable and authorized.
    async fn check(&self) -> Result<String>;
}

/// An importer that refuses to import; used for dry runs.
pub struct DisabledImporter;

#[async_trait]
impl MediaImporter for DisabledImporter {
    async fn sideload(&self, url: &str, _parent: u64, _title: &str) -> Result<u64> {
        anyhow::bail!("sideloading is disabled, not importing {}", url)
    }

    async fn check(&self) -> Result<String> {
        Ok("disabled".to_string())
    }
}
