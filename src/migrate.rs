//! Migration driver.
//!
//! Walks every post that still contains a legacy `[nggallery` shortcode,
//! imports the gallery's images as attachments of the post, and swaps the
//! shortcode for a native `[gallery]`.
//!
//! # Paging
//!
//! Candidates are fetched in fixed-size batches. The offset grows by one
//! for every post examined and shrinks by one for every post migrated:
//! migrated posts no longer match the search, so the offset only has to
//! step over posts that were skipped and still match.
//!
//! # Failures
//!
//! A post whose gallery can't be resolved is skipped untouched and will be
//! picked up again by the next run. A failed image is skipped and counted;
//! the post is still rewritten from the images that did import. Errors from
//! the content store while searching or saving a post abort the run.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::gallery::{image_url, parse_gallery_id, resolve_gallery, Resolution};
use crate::marker::correlation_marker;
use crate::models::{AttachmentUpdate, LegacyImage, Post, PostFilter, PostQuery};
use crate::options::RunOptions;
use crate::progress::{MigrationEvent, MigrationReporter, StdoutReporter};
use crate::shortcode::{build_gallery_shortcode, contains_marker, rewrite_content};
use crate::store::mysql::WordPressDb;
use crate::store::rest::RestMediaImporter;
use crate::store::{ContentStore, DisabledImporter, LegacyStore, MediaImporter};

/// Counters for a single run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationStats {
    pub posts_examined: u64,
    pub posts_migrated: u64,
    pub posts_skipped: u64,
    pub images_migrated: u64,
    pub image_errors: u64,
}

/// Knobs for a run, merged from config and command-line options.
#[derive(Clone, Debug)]
pub struct MigrationSettings {
    pub image_base_url: String,
    pub marker: String,
    pub batch_size: u64,
    pub filter: PostFilter,
    pub dry_run: bool,
    /// Stop after examining this many posts.
    pub limit: Option<u64>,
}

impl MigrationSettings {
    pub fn new(config: &Config, opts: &RunOptions) -> Self {
        Self {
            image_base_url: config.site.image_base_url.clone(),
            marker: config.migration.marker.clone(),
            batch_size: config.migration.batch_size,
            filter: opts.post_filter(),
            dry_run: opts.dry_run,
            limit: opts.limit,
        }
    }
}

enum PostOutcome {
    Migrated,
    Skipped,
}

/// Runs the migration against a set of collaborators.
pub struct Migrator<'a> {
    content: &'a dyn ContentStore,
    legacy: &'a dyn LegacyStore,
    media: &'a dyn MediaImporter,
    reporter: &'a dyn MigrationReporter,
    settings: MigrationSettings,
}

impl<'a> Migrator<'a> {
    pub fn new(
        content: &'a dyn ContentStore,
        legacy: &'a dyn LegacyStore,
        media: &'a dyn MediaImporter,
        reporter: &'a dyn MigrationReporter,
        settings: MigrationSettings,
    ) -> Self {
        Self {
            content,
            legacy,
            media,
            reporter,
            settings,
        }
    }

    pub async fn run(&self) -> Result<MigrationStats> {
        self.reporter.report(MigrationEvent::Started {
            dry_run: self.settings.dry_run,
        });

        let mut stats = MigrationStats::default();
        let mut offset: u64 = 0;

        loop {
            let limit = match self.settings.limit {
                Some(max) => {
                    let remaining = max.saturating_sub(stats.posts_examined);
                    if remaining == 0 {
                        break;
                    }
                    remaining.min(self.settings.batch_size)
                }
                None => self.settings.batch_size,
            };

            let query = PostQuery {
                marker: self.settings.marker.clone(),
                filter: self.settings.filter.clone(),
                limit,
                offset,
            };
            let posts = self.content.search_posts(&query).await?;
            if posts.is_empty() {
                break;
            }

            self.reporter.report(MigrationEvent::BatchStarted {
                offset,
                posts: posts.len(),
            });

            for post in &posts {
                offset += 1;
                stats.posts_examined += 1;
                match self.migrate_post(post, &mut stats).await? {
                    PostOutcome::Migrated => {
                        offset -= 1;
                        stats.posts_migrated += 1;
                    }
                    PostOutcome::Skipped => stats.posts_skipped += 1,
                }
            }

            self.content.end_batch().await?;
            tracing::debug!(offset, examined = stats.posts_examined, "batch done");
        }

        self.reporter.report(MigrationEvent::Finished(stats.clone()));
        Ok(stats)
    }

    async fn migrate_post(&self, post: &Post, stats: &mut MigrationStats) -> Result<PostOutcome> {
        let Some(gallery_id) = parse_gallery_id(&post.content) else {
            self.reporter
                .report(MigrationEvent::NoGalleryId { post_id: post.id });
            return Ok(PostOutcome::Skipped);
        };

        let resolved = match resolve_gallery(self.legacy, gallery_id).await? {
            Resolution::Found(resolved) => resolved,
            Resolution::MissingGallery | Resolution::NoImages => {
                self.reporter.report(MigrationEvent::GalleryNotFound {
                    post_id: post.id,
                    gallery_id,
                });
                return Ok(PostOutcome::Skipped);
            }
        };

        // Captured before importing so only pre-existing images are excluded.
        let existing = self.content.existing_image_attachments(post.id).await?;
        let shortcode = build_gallery_shortcode(&existing);

        // A shortcode the rewrite can't remove would be re-imported every run.
        let content = rewrite_content(&post.content, &shortcode);
        if contains_marker(&content, &self.settings.marker) {
            self.reporter
                .report(MigrationEvent::MarkerRemains { post_id: post.id });
            return Ok(PostOutcome::Skipped);
        }

        if self.settings.dry_run {
            self.reporter.report(MigrationEvent::WouldMigrate {
                post_id: post.id,
                gallery_id,
                images: resolved.images.len(),
                shortcode,
            });
            return Ok(PostOutcome::Skipped);
        }

        for image in &resolved.images {
            let url = image_url(
                &self.settings.image_base_url,
                &resolved.gallery.path,
                &image.filename,
            );
            self.reporter.report(MigrationEvent::ImportingImage {
                post_id: post.id,
                url: url.clone(),
            });

            match self.import_image(post.id, &url, image).await {
                Ok(attachment_id) => {
                    stats.images_migrated += 1;
                    self.reporter.report(MigrationEvent::AttachmentAdded {
                        post_id: post.id,
                        attachment_id,
                    });
                }
                Err(e) => {
                    stats.image_errors += 1;
                    tracing::warn!(
                        post_id = post.id,
                        url = %url,
                        error = %e,
                        "image import failed"
                    );
                    self.reporter.report(MigrationEvent::AttachmentFailed {
                        post_id: post.id,
                        url,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        self.content.update_post_content(post.id, &content).await?;
        self.reporter
            .report(MigrationEvent::PostUpdated { post_id: post.id });
        Ok(PostOutcome::Migrated)
    }

    /// Sideload one image and fill in its metadata. Returns the attachment id.
    async fn import_image(&self, post_id: u64, url: &str, image: &LegacyImage) -> Result<u64> {
        let marker = correlation_marker(url, &image.description);
        let created = self.media.sideload(url, post_id, &marker).await?;

        let found = self.content.find_attachments(post_id, &marker).await?;
        match found.as_slice() {
            [only] if only.id == created => {}
            [] => bail!("no attachment carries the import marker"),
            [other] => bail!(
                "import marker found on attachment {} instead of {}",
                other.id,
                created
            ),
            many => bail!("{} attachments carry the import marker", many.len()),
        }

        let alt_text = if image.alt_text.trim().is_empty() {
            image.filename.clone()
        } else {
            image.alt_text.clone()
        };
        let update = AttachmentUpdate {
            title: alt_text.clone(),
            content: image.description.clone(),
            menu_order: image.sort_order,
            alt_text,
        };
        self.content.update_attachment(created, &update).await?;
        Ok(created)
    }
}

/// `escape-ngg run`: migrate against the configured WordPress site.
pub async fn run_migration(config: &Config, opts: &RunOptions) -> Result<MigrationStats> {
    let pool = db::connect(config).await?;
    let wp = WordPressDb::new(pool, &config.database.table_prefix);

    let rest;
    let disabled = DisabledImporter;
    let media: &dyn MediaImporter = if opts.dry_run {
        &disabled
    } else {
        rest = RestMediaImporter::new(&config.site)?;
        &rest
    };

    let reporter = StdoutReporter {
        verbose: opts.verbose,
    };
    let migrator = Migrator::new(
        &wp,
        &wp,
        media,
        &reporter,
        MigrationSettings::new(config, opts),
    );
    let result = migrator.run().await;

    wp.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingReporter;
    use crate::store::memory::InMemoryWordPress;

    fn settings() -> MigrationSettings {
        MigrationSettings {
            image_base_url: "https://example.com/".to_string(),
            marker: "[nggallery".to_string(),
            batch_size: 50,
            filter: PostFilter::default(),
            dry_run: false,
            limit: None,
        }
    }

    async fn run(
        wp: &InMemoryWordPress,
        settings: MigrationSettings,
    ) -> (MigrationStats, RecordingReporter) {
        let reporter = RecordingReporter::new();
        let stats = Migrator::new(wp, wp, wp, &reporter, settings)
            .run()
            .await
            .unwrap();
        (stats, reporter)
    }

    #[tokio::test]
    async fn test_blank_alt_text_falls_back_to_filename() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=3]");
        wp.add_gallery(3, "g");
        wp.add_image(3, 1, "sunset.jpg", "Evening", "   ", 4);

        let (stats, _) = run(&wp, settings()).await;
        assert_eq!(stats.images_migrated, 1);

        let attachment = &wp.attachments_of(1)[0];
        assert_eq!(attachment.title, "sunset.jpg");
        assert_eq!(attachment.content, "Evening");
        assert_eq!(attachment.menu_order, 4);
        assert_eq!(wp.alt_text(attachment.id).as_deref(), Some("sunset.jpg"));
    }

    #[tokio::test]
    async fn test_no_gallery_id_is_skipped_without_warning() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery template=carousel]");

        let (stats, reporter) = run(&wp, settings()).await;
        assert_eq!(stats.posts_skipped, 1);
        assert_eq!(reporter.warnings(), 0);
        assert!(reporter
            .events()
            .contains(&MigrationEvent::NoGalleryId { post_id: 1 }));
        assert_eq!(wp.post(1).unwrap().content, "[nggallery template=carousel]");
    }

    #[tokio::test]
    async fn test_empty_gallery_is_skipped() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=3]");
        wp.add_gallery(3, "g");

        let (stats, reporter) = run(&wp, settings()).await;
        assert_eq!(stats.posts_migrated, 0);
        assert_eq!(reporter.warnings(), 1);
        assert_eq!(wp.post(1).unwrap().content, "[nggallery id=3]");
    }

    #[tokio::test]
    async fn test_unclosed_shortcode_does_not_loop() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=3");
        wp.add_gallery(3, "g");
        wp.add_image(3, 1, "a.jpg", "", "A", 1);

        let (stats, reporter) = run(&wp, settings()).await;
        assert_eq!(stats.posts_examined, 1);
        assert_eq!(stats.posts_skipped, 1);
        assert!(reporter
            .events()
            .contains(&MigrationEvent::MarkerRemains { post_id: 1 }));
        assert_eq!(wp.search_offsets(), vec![0, 1]);
        assert!(wp.sideloaded_urls().is_empty());
        assert!(wp.attachments_of(1).is_empty());
    }

    #[tokio::test]
    async fn test_unclosed_shortcode_imports_nothing_on_rerun() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=3");
        wp.add_gallery(3, "g");
        wp.add_image(3, 1, "a.jpg", "", "A", 1);

        for _ in 0..3 {
            let (stats, _) = run(&wp, settings()).await;
            assert_eq!(stats.images_migrated, 0);
        }
        assert!(wp.attachments_of(1).is_empty());
        assert_eq!(wp.post(1).unwrap().content, "[nggallery id=3");
    }

    #[tokio::test]
    async fn test_limit_stops_early() {
        let wp = InMemoryWordPress::new();
        for id in 1..=10 {
            wp.add_post(id, "[nggallery]");
        }
        let mut s = settings();
        s.limit = Some(4);
        s.batch_size = 3;

        let (stats, _) = run(&wp, s).await;
        assert_eq!(stats.posts_examined, 4);
        assert_eq!(wp.search_offsets(), vec![0, 3]);
    }

    #[tokio::test]
    async fn test_marker_on_several_attachments_fails_image() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=3]");
        wp.add_gallery(3, "g");
        wp.add_image(3, 1, "twice.jpg", "", "A", 1);
        wp.add_image(3, 2, "ok.jpg", "", "B", 2);
        wp.duplicate_sideload("twice.jpg");

        let (stats, reporter) = run(&wp, settings()).await;
        assert_eq!(stats.images_migrated, 1);
        assert_eq!(stats.image_errors, 1);
        assert_eq!(stats.posts_migrated, 1);
        assert_eq!(reporter.warnings(), 1);
    }

    #[tokio::test]
    async fn test_marker_on_other_attachment_fails_image() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=3]");
        wp.add_attachment(1, 5);
        wp.add_gallery(3, "g");
        wp.add_image(3, 1, "a.jpg", "Desc", "A", 1);
        wp.misdirect_sideload("a.jpg", 5);

        let (stats, reporter) = run(&wp, settings()).await;
        assert_eq!(stats.images_migrated, 0);
        assert_eq!(stats.image_errors, 1);
        assert_eq!(stats.posts_migrated, 1);

        let reason = reporter.events().into_iter().find_map(|e| match e {
            MigrationEvent::AttachmentFailed { reason, .. } => Some(reason),
            _ => None,
        });
        assert!(reason.unwrap().contains("instead of 1000"));

        // Neither attachment gets the image metadata.
        assert_eq!(wp.alt_text(5), None);
        assert_eq!(wp.alt_text(1000), None);
        assert_eq!(wp.post(1).unwrap().content, r#"[gallery exclude="5"]"#);
    }
}
