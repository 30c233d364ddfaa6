//! Core data models used throughout escape-ngg.
//!
//! Posts and attachments mirror rows of the WordPress `posts` table; the
//! legacy types mirror NextGen Gallery's `ngg_gallery` and `ngg_pictures`.

use chrono::NaiveDate;

/// A post or page that may embed a legacy gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub content: String,
    pub status: String,
    pub post_type: String,
}

/// An attachment post parented to a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub parent: u64,
    pub title: String,
    pub content: String,
    pub menu_order: i64,
    pub mime_type: String,
}

/// Metadata written onto a freshly sideloaded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpdate {
    pub title: String,
    pub content: String,
    pub menu_order: i64,
    /// Stored under the `_wp_attachment_image_alt` meta key.
    pub alt_text: String,
}

/// One row of `ngg_gallery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyGallery {
    pub gid: u64,
    /// Storage path relative to the site root, e.g. `wp-content/gallery/summer`.
    pub path: String,
}

/// One row of `ngg_pictures`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyImage {
    pub pid: u64,
    pub gallery_id: u64,
    pub filename: String,
    pub description: String,
    pub alt_text: String,
    pub sort_order: i64,
}

/// Optional narrowing of the candidate post set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Only posts dated on or after this day.
    pub start_date: Option<NaiveDate>,
    /// Only posts dated on or before this day (inclusive).
    pub end_date: Option<NaiveDate>,
    /// Only these post ids, when non-empty.
    pub post_ids: Vec<u64>,
}

/// A single page of the candidate query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    /// Substring the post body must contain (case-insensitive).
    pub marker: String,
    pub filter: PostFilter,
    pub limit: u64,
    pub offset: u64,
}

/// Post types the migration looks at.
pub const POST_TYPES: [&str; 2] = ["post", "page"];

/// Statuses excluded from an "any status" search, matching WordPress.
pub const EXCLUDED_STATUSES: [&str; 2] = ["trash", "auto-draft"];

/// Meta key WordPress reads image alt text from.
pub const ALT_TEXT_META_KEY: &str = "_wp_attachment_image_alt";
