//! In-memory WordPress for tests and dry experiments.
//!
//! Implements [`ContentStore`], [`LegacyStore`] and [`MediaImporter`] over
//! plain collections behind `std::sync::RwLock`. Every store call is
//! appended to a query log that [`ContentStore::end_batch`] clears, the way
//! a long-lived database handle accumulates per-query state.
//!
//! Sideloading can be told to fail for a filename, or to produce a
//! duplicate attachment carrying the same title, to exercise the importer's
//! error paths.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    Attachment, AttachmentUpdate, LegacyGallery, LegacyImage, Post, PostQuery, ALT_TEXT_META_KEY,
    EXCLUDED_STATUSES, POST_TYPES,
};
use crate::shortcode::contains_marker;

use super::{ContentStore, LegacyStore, MediaImporter};

struct StoredPost {
    post: Post,
    date: Option<NaiveDate>,
}

#[derive(Default)]
struct State {
    posts: Vec<StoredPost>,
    attachments: Vec<Attachment>,
    meta: HashMap<(u64, String), String>,
    galleries: HashMap<u64, LegacyGallery>,
    images: Vec<LegacyImage>,
    fail_sideload: HashSet<String>,
    duplicate_sideload: HashSet<String>,
    misdirect_sideload: HashMap<String, u64>,
    sideloaded: Vec<String>,
    search_offsets: Vec<u64>,
    query_log: Vec<String>,
    batches_ended: usize,
    next_id: u64,
}

/// A WordPress site held entirely in memory.
pub struct InMemoryWordPress {
    state: RwLock<State>,
}

impl InMemoryWordPress {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1000,
                ..State::default()
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a published post with no date.
    pub fn add_post(&self, id: u64, content: &str) {
        self.add_post_with(
            Post {
                id,
                content: content.to_string(),
                status: "publish".to_string(),
                post_type: "post".to_string(),
            },
            None,
        );
    }

    pub fn add_post_with(&self, post: Post, date: Option<NaiveDate>) {
        self.write().posts.push(StoredPost { post, date });
    }

    /// Add an image attachment that exists before migration.
    pub fn add_attachment(&self, parent: u64, id: u64) {
        self.write().attachments.push(Attachment {
            id,
            parent,
            title: format!("existing-{}", id),
            content: String::new(),
            menu_order: 0,
            mime_type: "image/jpeg".to_string(),
        });
    }

    pub fn add_gallery(&self, gid: u64, path: &str) {
        self.write().galleries.insert(
            gid,
            LegacyGallery {
                gid,
                path: path.to_string(),
            },
        );
    }

    pub fn add_image(
        &self,
        gallery_id: u64,
        pid: u64,
        filename: &str,
        description: &str,
        alt_text: &str,
        sort_order: i64,
    ) {
        self.write().images.push(LegacyImage {
            pid,
            gallery_id,
            filename: filename.to_string(),
            description: description.to_string(),
            alt_text: alt_text.to_string(),
            sort_order,
        });
    }

    /// Make sideloading any URL ending in `filename` fail.
    pub fn fail_sideload(&self, filename: &str) {
        self.write().fail_sideload.insert(filename.to_string());
    }

    /// Make sideloading `filename` create two attachments with the same title.
    pub fn duplicate_sideload(&self, filename: &str) {
        self.write().duplicate_sideload.insert(filename.to_string());
    }

    /// Make sideloading `filename` put its title on attachment `attachment_id`
    /// instead of the attachment it creates.
    pub fn misdirect_sideload(&self, filename: &str, attachment_id: u64) {
        self.write()
            .misdirect_sideload
            .insert(filename.to_string(), attachment_id);
    }

    pub fn post(&self, id: u64) -> Option<Post> {
        self.read()
            .posts
            .iter()
            .find(|p| p.post.id == id)
            .map(|p| p.post.clone())
    }

    pub fn attachments_of(&self, parent: u64) -> Vec<Attachment> {
        self.read()
            .attachments
            .iter()
            .filter(|a| a.parent == parent)
            .cloned()
            .collect()
    }

    pub fn alt_text(&self, attachment_id: u64) -> Option<String> {
        self.read()
            .meta
            .get(&(attachment_id, ALT_TEXT_META_KEY.to_string()))
            .cloned()
    }

    /// URLs passed to [`MediaImporter::sideload`], in call order.
    pub fn sideloaded_urls(&self) -> Vec<String> {
        self.read().sideloaded.clone()
    }

    /// Offsets of every `search_posts` call, in call order.
    pub fn search_offsets(&self) -> Vec<u64> {
        self.read().search_offsets.clone()
    }

    pub fn query_log_len(&self) -> usize {
        self.read().query_log.len()
    }

    pub fn batches_ended(&self) -> usize {
        self.read().batches_ended
    }

    fn log(&self, entry: String) {
        self.write().query_log.push(entry);
    }

    fn matching_posts(state: &State, query: &PostQuery) -> Vec<Post> {
        state
            .posts
            .iter()
            .filter(|p| POST_TYPES.contains(&p.post.post_type.as_str()))
            .filter(|p| !EXCLUDED_STATUSES.contains(&p.post.status.as_str()))
            .filter(|p| contains_marker(&p.post.content, &query.marker))
            .filter(|p| {
                query.filter.post_ids.is_empty() || query.filter.post_ids.contains(&p.post.id)
            })
            .filter(|p| match (query.filter.start_date, p.date) {
                (Some(start), Some(date)) => date >= start,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|p| match (query.filter.end_date, p.date) {
                (Some(end), Some(date)) => date <= end,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|p| p.post.clone())
            .collect()
    }
}

impl Default for InMemoryWordPress {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryWordPress {
    async fn search_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        self.log(format!("search offset={} limit={}", query.offset, query.limit));
        let mut state = self.write();
        state.search_offsets.push(query.offset);
        Ok(Self::matching_posts(&state, query)
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64> {
        self.log("count posts".to_string());
        Ok(Self::matching_posts(&self.read(), query).len() as u64)
    }

    async fn existing_image_attachments(&self, post_id: u64) -> Result<Vec<u64>> {
        self.log(format!("existing attachments of {}", post_id));
        Ok(self
            .read()
            .attachments
            .iter()
            .filter(|a| a.parent == post_id && a.mime_type.starts_with("image/"))
            .map(|a| a.id)
            .collect())
    }

    async fn find_attachments(&self, parent: u64, needle: &str) -> Result<Vec<Attachment>> {
        self.log(format!("find attachments of {} by {}", parent, needle));
        Ok(self
            .read()
            .attachments
            .iter()
            .filter(|a| a.parent == parent)
            .filter(|a| a.title.contains(needle) || a.content.contains(needle))
            .cloned()
            .collect())
    }

    async fn update_attachment(&self, attachment_id: u64, update: &AttachmentUpdate) -> Result<()> {
        self.log(format!("update attachment {}", attachment_id));
        let mut state = self.write();
        let Some(attachment) = state.attachments.iter_mut().find(|a| a.id == attachment_id) else {
            bail!("attachment not found: {}", attachment_id);
        };
        attachment.title = update.title.clone();
        attachment.content = update.content.clone();
        attachment.menu_order = update.menu_order;
        state.meta.insert(
            (attachment_id, ALT_TEXT_META_KEY.to_string()),
            update.alt_text.clone(),
        );
        Ok(())
    }

    async fn update_post_content(&self, post_id: u64, content: &str) -> Result<()> {
        self.log(format!("update post {}", post_id));
        let mut state = self.write();
        let Some(stored) = state.posts.iter_mut().find(|p| p.post.id == post_id) else {
            bail!("post not found: {}", post_id);
        };
        stored.post.content = content.to_string();
        Ok(())
    }

    async fn end_batch(&self) -> Result<()> {
        let mut state = self.write();
        state.query_log.clear();
        state.batches_ended += 1;
        Ok(())
    }
}

#[async_trait]
impl LegacyStore for InMemoryWordPress {
    async fn gallery(&self, gallery_id: u64) -> Result<Option<LegacyGallery>> {
        self.log(format!("gallery {}", gallery_id));
        Ok(self.read().galleries.get(&gallery_id).cloned())
    }

    async fn images(&self, gallery_id: u64) -> Result<Vec<LegacyImage>> {
        self.log(format!("images of {}", gallery_id));
        let mut images: Vec<LegacyImage> = self
            .read()
            .images
            .iter()
            .filter(|img| img.gallery_id == gallery_id)
            .cloned()
            .collect();
        images.sort_by_key(|img| (img.sort_order, img.pid));
        Ok(images)
    }

    async fn counts(&self) -> Result<(u64, u64)> {
        let state = self.read();
        Ok((state.galleries.len() as u64, state.images.len() as u64))
    }
}

#[async_trait]
impl MediaImporter for InMemoryWordPress {
    async fn sideload(&self, url: &str, parent: u64, title: &str) -> Result<u64> {
        let filename = url.rsplit('/').next().unwrap_or(url).to_string();
        let mut state = self.write();
        state.sideloaded.push(url.to_string());

        if state.fail_sideload.contains(&filename) {
            bail!("HTTP 404 fetching {}", url);
        }

        let copies = if state.duplicate_sideload.contains(&filename) {
            2
        } else {
            1
        };

        let misdirected = state.misdirect_sideload.get(&filename).copied();
        let created_title = if misdirected.is_some() { "" } else { title };

        let first_id = state.next_id;
        for _ in 0..copies {
            let id = state.next_id;
            state.next_id += 1;
            state.attachments.push(Attachment {
                id,
                parent,
                title: created_title.to_string(),
                content: String::new(),
                menu_order: 0,
                mime_type: "image/jpeg".to_string(),
            });
        }

        if let Some(target) = misdirected {
            if let Some(other) = state.attachments.iter_mut().find(|a| a.id == target) {
                other.title = title.to_string();
            }
        }
        Ok(first_id)
    }

    async fn check(&self) -> Result<String> {
        Ok("in-memory".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostFilter;

    fn query(offset: u64, limit: u64) -> PostQuery {
        PostQuery {
            marker: "[nggallery".to_string(),
            filter: PostFilter::default(),
            limit,
            offset,
        }
    }

    #[tokio::test]
    async fn test_search_skips_trash_and_attachments() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=1]");
        wp.add_post_with(
            Post {
                id: 2,
                content: "[nggallery id=1]".to_string(),
                status: "trash".to_string(),
                post_type: "post".to_string(),
            },
            None,
        );
        wp.add_post_with(
            Post {
                id: 3,
                content: "[NGGALLERY id=1]".to_string(),
                status: "draft".to_string(),
                post_type: "page".to_string(),
            },
            None,
        );
        wp.add_post_with(
            Post {
                id: 4,
                content: "[nggallery id=1]".to_string(),
                status: "publish".to_string(),
                post_type: "product".to_string(),
            },
            None,
        );

        let ids: Vec<u64> = wp
            .search_posts(&query(0, 50))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_search_paging_and_filters() {
        let wp = InMemoryWordPress::new();
        for id in 1..=5 {
            wp.add_post_with(
                Post {
                    id,
                    content: "[nggallery id=1]".to_string(),
                    status: "publish".to_string(),
                    post_type: "post".to_string(),
                },
                NaiveDate::from_ymd_opt(2011, 5, id as u32),
            );
        }

        let page: Vec<u64> = wp
            .search_posts(&query(1, 2))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(page, vec![2, 3]);

        let mut q = query(0, 50);
        q.filter.start_date = NaiveDate::from_ymd_opt(2011, 5, 2);
        q.filter.end_date = NaiveDate::from_ymd_opt(2011, 5, 4);
        q.filter.post_ids = vec![1, 2, 4];
        let ids: Vec<u64> = wp
            .search_posts(&q)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(wp.count_posts(&q).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_end_batch_clears_query_log() {
        let wp = InMemoryWordPress::new();
        wp.search_posts(&query(0, 50)).await.unwrap();
        wp.gallery(1).await.unwrap();
        assert_eq!(wp.query_log_len(), 2);
        wp.end_batch().await.unwrap();
        assert_eq!(wp.query_log_len(), 0);
        assert_eq!(wp.batches_ended(), 1);
    }

    #[tokio::test]
    async fn test_sideload_failures_and_duplicates() {
        let wp = InMemoryWordPress::new();
        wp.fail_sideload("bad.jpg");
        wp.duplicate_sideload("twice.jpg");

        assert!(wp.sideload("http://x/bad.jpg", 1, "m1").await.is_err());
        let id = wp.sideload("http://x/twice.jpg", 1, "m2").await.unwrap();
        assert_eq!(wp.find_attachments(1, "m2").await.unwrap().len(), 2);
        assert_eq!(wp.attachments_of(1)[0].id, id);
        assert_eq!(wp.sideloaded_urls().len(), 2);
    }
}
