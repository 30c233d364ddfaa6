//! Migration progress reporting.
//!
//! The driver emits [`MigrationEvent`]s; a [`MigrationReporter`] turns them
//! into output. [`StdoutReporter`] prints the human-readable log, and
//! [`RecordingReporter`] keeps events in memory for tests.

use std::io::Write;
use std::sync::Mutex;

use crate::migrate::MigrationStats;

/// Something that happened during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationEvent {
    Started { dry_run: bool },
    BatchStarted { offset: u64, posts: usize },
    NoGalleryId { post_id: u64 },
    GalleryNotFound { post_id: u64, gallery_id: u64 },
    ImportingImage { post_id: u64, url: String },
    AttachmentAdded { post_id: u64, attachment_id: u64 },
    AttachmentFailed { post_id: u64, url: String, reason: String },
    PostUpdated { post_id: u64 },
    /// The rewrite left the marker in place, so the post stays unmigrated.
    MarkerRemains { post_id: u64 },
    WouldMigrate { post_id: u64, gallery_id: u64, images: usize, shortcode: String },
    Finished(MigrationStats),
}

impl MigrationEvent {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            MigrationEvent::GalleryNotFound { .. }
                | MigrationEvent::AttachmentFailed { .. }
                | MigrationEvent::MarkerRemains { .. }
        )
    }
}

/// Receives progress events from the migration driver.
pub trait MigrationReporter: Send + Sync {
    fn report(&self, event: MigrationEvent);
}

/// Human-friendly output on stdout. `verbose` adds batch boundaries and
/// source URLs.
pub struct StdoutReporter {
    pub verbose: bool,
}

impl StdoutReporter {
    fn render(&self, event: &MigrationEvent) -> Option<String> {
        let line = match event {
            MigrationEvent::Started { dry_run } => {
                if *dry_run {
                    "Running for our lives... (dry run)\n\n".to_string()
                } else {
                    "Running for our lives...\n\n".to_string()
                }
            }
            MigrationEvent::BatchStarted { offset, posts } => {
                if !self.verbose {
                    return None;
                }
                format!("Batch of {} posts at offset {}\n", posts, offset)
            }
            MigrationEvent::NoGalleryId { post_id } => {
                format!("Could not match gallery id in {}\n", post_id)
            }
            MigrationEvent::GalleryNotFound {
                post_id,
                gallery_id,
            } => format!(
                "Warning: Could not find images for nggallery {} (post {})\n",
                gallery_id, post_id
            ),
            MigrationEvent::ImportingImage { post_id, url } => {
                if !self.verbose {
                    return None;
                }
                format!("Importing {} into {}\n", url, post_id)
            }
            MigrationEvent::AttachmentAdded {
                post_id,
                attachment_id,
            } => {
                if self.verbose {
                    format!("Added attachment {} for {}\n", attachment_id, post_id)
                } else {
                    format!("Added attachment for {}\n", post_id)
                }
            }
            MigrationEvent::AttachmentFailed {
                post_id,
                url,
                reason,
            } => format!(
                "Warning: Could not insert attachment for {}: {} ({})\n",
                post_id, reason, url
            ),
            MigrationEvent::PostUpdated { post_id } => format!("Updated post {}\n", post_id),
            MigrationEvent::MarkerRemains { post_id } => format!(
                "Warning: Post {} still contains an unconverted nggallery shortcode\n",
                post_id
            ),
            MigrationEvent::WouldMigrate {
                post_id,
                gallery_id,
                images,
                shortcode,
            } => format!(
                "Would migrate post {}: nggallery {} ({} images) -> {}\n",
                post_id, gallery_id, images, shortcode
            ),
            MigrationEvent::Finished(stats) => format!(
                "\nescape-ngg\n  posts examined: {}\n  posts migrated: {}\n  posts skipped: {}\n  images migrated: {}\n  image errors: {}\nSuccess: All done!\n",
                format_number(stats.posts_examined),
                format_number(stats.posts_migrated),
                format_number(stats.posts_skipped),
                format_number(stats.images_migrated),
                format_number(stats.image_errors),
            ),
        };
        Some(line)
    }
}

impl MigrationReporter for StdoutReporter {
    fn report(&self, event: MigrationEvent) {
        if let Some(line) = self.render(&event) {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(line.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Keeps every event, for assertions in tests.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> usize {
        self.events().iter().filter(|e| e.is_warning()).count()
    }
}

impl MigrationReporter for RecordingReporter {
    fn report(&self, event: MigrationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}
