//! Gallery resolution.
//!
//! Finds the NGG gallery id in a post body and loads the gallery row and
//! its images from the legacy tables.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

use crate::models::{LegacyGallery, LegacyImage};
use crate::store::LegacyStore;

static GALLERY_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)nggallery id\s*="?\s*(?P<id>\d+)"#).expect("gallery id pattern is valid")
});

/// A gallery with at least one image, ready for import.
#[derive(Debug, Clone)]
pub struct ResolvedGallery {
    pub gallery: LegacyGallery,
    /// Ordered by sort order, then picture id.
    pub images: Vec<LegacyImage>,
}

/// Result of looking a gallery id up in the legacy store.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ResolvedGallery),
    /// No `ngg_gallery` row for the id.
    MissingGallery,
    /// The gallery exists but has no pictures.
    NoImages,
}

/// Extract the first gallery id from `[nggallery id=N]`-style text.
///
/// Ids too large for `u64` are treated as no match.
pub fn parse_gallery_id(content: &str) -> Option<u64> {
    GALLERY_ID_RE
        .captures(content)
        .and_then(|caps| caps.name("id"))
        .and_then(|m| m.as_str().parse().ok())
}

/// Load a gallery and its ordered images.
pub async fn resolve_gallery(legacy: &dyn LegacyStore, gallery_id: u64) -> Result<Resolution> {
    let gallery = legacy
        .gallery(gallery_id)
        .await
        .with_context(|| format!("Failed to read nggallery {}", gallery_id))?;
    let Some(gallery) = gallery else {
        return Ok(Resolution::MissingGallery);
    };

    let mut images = legacy
        .images(gallery_id)
        .await
        .with_context(|| format!("Failed to read images for nggallery {}", gallery_id))?;
    if images.is_empty() {
        return Ok(Resolution::NoImages);
    }

    // Stores already order this way; keep it stable regardless of backend.
    images.sort_by_key(|img| (img.sort_order, img.pid));

    Ok(Resolution::Found(ResolvedGallery { gallery, images }))
}

/// Absolute URL of a legacy image.
///
/// `base` and `path` are joined with exactly one slash; the path gets a
/// trailing slash before the filename.
pub fn image_url(base: &str, path: &str, filename: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("{}/{}", base, filename)
    } else {
        format!("{}/{}/{}", base, path, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryWordPress;

    #[test]
    fn test_parse_plain_id() {
        assert_eq!(parse_gallery_id("before [nggallery id=12] after"), Some(12));
    }

    #[test]
    fn test_parse_quoted_and_spaced() {
        assert_eq!(parse_gallery_id(r#"[nggallery id="7"]"#), Some(7));
        assert_eq!(parse_gallery_id(r#"[nggallery id ="7"]"#), Some(7));
        assert_eq!(parse_gallery_id("[nggallery id= 8]"), Some(8));
        // The quote must directly follow the equals sign.
        assert_eq!(parse_gallery_id(r#"[nggallery id= "9"]"#), None);
        assert_eq!(parse_gallery_id(r#"[nggallery id="  42"]"#), Some(42));
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(parse_gallery_id("[NGGallery ID=3]"), Some(3));
    }

    #[test]
    fn test_parse_first_match_wins() {
        assert_eq!(parse_gallery_id("[nggallery id=1] [nggallery id=2]"), Some(1));
    }

    #[test]
    fn test_parse_no_id() {
        assert_eq!(parse_gallery_id("[nggallery]"), None);
        assert_eq!(parse_gallery_id("[nggallery id=abc]"), None);
        assert_eq!(parse_gallery_id("no gallery here"), None);
    }

    #[test]
    fn test_parse_overflow_is_no_match() {
        assert_eq!(parse_gallery_id("[nggallery id=99999999999999999999999]"), None);
    }

    #[test]
    fn test_image_url_joins() {
        assert_eq!(
            image_url("https://example.com/", "2011/05", "a.jpg"),
            "https://example.com/2011/05/a.jpg"
        );
        assert_eq!(
            image_url("https://example.com", "/wp-content/gallery/x/", "b.png"),
            "https://example.com/wp-content/gallery/x/b.png"
        );
        assert_eq!(image_url("https://example.com/", "", "c.gif"), "https://example.com/c.gif");
    }

    #[tokio::test]
    async fn test_resolve_orders_by_sort_then_pid() {
        let wp = InMemoryWordPress::new();
        wp.add_gallery(5, "g");
        wp.add_image(5, 30, "c.jpg", "", "", 2);
        wp.add_image(5, 20, "b.jpg", "", "", 1);
        wp.add_image(5, 10, "a.jpg", "", "", 1);

        let Resolution::Found(resolved) = resolve_gallery(&wp, 5).await.unwrap() else {
            panic!("expected gallery");
        };
        let names: Vec<_> = resolved.images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[tokio::test]
    async fn test_resolve_missing_and_empty() {
        let wp = InMemoryWordPress::new();
        wp.add_gallery(1, "empty");
        assert!(matches!(
            resolve_gallery(&wp, 1).await.unwrap(),
            Resolution::NoImages
        ));
        assert!(matches!(
            resolve_gallery(&wp, 2).await.unwrap(),
            Resolution::MissingGallery
        ));
    }
}
