//! WordPress database backend.
//!
//! Reads and writes `{prefix}posts` / `{prefix}postmeta` directly and reads
//! the NextGen Gallery tables `{prefix}ngg_gallery` / `{prefix}ngg_pictures`.
//! Writes bypass WordPress hooks, revisions and the object cache; flush a
//! persistent object cache (`wp cache flush`) after a run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

use crate::models::{
    Attachment, AttachmentUpdate, LegacyGallery, LegacyImage, Post, PostFilter, PostQuery,
    ALT_TEXT_META_KEY,
};

use super::{ContentStore, LegacyStore};

/// A WordPress database reached over a MySQL pool.
pub struct WordPressDb {
    pool: MySqlPool,
    prefix: String,
}

impl WordPressDb {
    /// `prefix` is interpolated into table names and must already be
    /// validated (see [`crate::config::load_config`]).
    pub fn new(pool: MySqlPool, prefix: &str) -> Self {
        Self {
            pool,
            prefix: prefix.to_string(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Shared `WHERE` clause of the candidate query.
    fn push_candidate_filter<'a>(&self, qb: &mut QueryBuilder<'a, MySql>, query: &'a PostQuery) {
        qb.push(" WHERE post_type IN ('post', 'page')");
        qb.push(" AND post_status NOT IN ('trash', 'auto-draft')");
        qb.push(" AND post_content LIKE ");
        qb.push_bind(like_pattern(&query.marker));
        push_post_filter(qb, &query.filter);
    }
}

fn push_post_filter<'a>(qb: &mut QueryBuilder<'a, MySql>, filter: &'a PostFilter) {
    if let Some(start) = filter.start_date {
        qb.push(" AND post_date >= ");
        qb.push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND post_date < DATE_ADD(");
        qb.push_bind(end);
        qb.push(", INTERVAL 1 DAY)");
    }
    if !filter.post_ids.is_empty() {
        qb.push(" AND ID IN (");
        let mut ids = qb.separated(", ");
        for id in &filter.post_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl ContentStore for WordPressDb {
    async fn search_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT ID, post_content, post_status, post_type FROM {}",
            self.table("posts")
        ));
        self.push_candidate_filter(&mut qb, query);
        qb.push(" ORDER BY post_date DESC, ID DESC LIMIT ");
        qb.push_bind(query.limit);
        qb.push(" OFFSET ");
        qb.push_bind(query.offset);

        tracing::debug!(offset = query.offset, limit = query.limit, "searching posts");
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to search posts")?;

        rows.iter()
            .map(|row| -> Result<Post> {
                Ok(Post {
                    id: row.try_get("ID")?,
                    content: row.try_get("post_content")?,
                    status: row.try_get("post_status")?,
                    post_type: row.try_get("post_type")?,
                })
            })
            .collect()
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64> {
        let mut qb =
            QueryBuilder::<MySql>::new(format!("SELECT COUNT(*) FROM {}", self.table("posts")));
        self.push_candidate_filter(&mut qb, query);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count posts")?;
        Ok(count as u64)
    }

    async fn existing_image_attachments(&self, post_id: u64) -> Result<Vec<u64>> {
        let ids: Vec<u64> = sqlx::query_scalar(&format!(
            "SELECT ID FROM {} WHERE post_type = 'attachment' AND post_status = 'inherit' \
             AND post_parent = ? AND post_mime_type LIKE 'image/%' ORDER BY ID ASC",
            self.table("posts")
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list attachments of post {}", post_id))?;
        Ok(ids)
    }

    async fn find_attachments(&self, parent: u64, needle: &str) -> Result<Vec<Attachment>> {
        let pattern = like_pattern(needle);
        let rows = sqlx::query(&format!(
            "SELECT ID, post_parent, post_title, post_content, \
             CAST(menu_order AS SIGNED) AS menu_order, post_mime_type FROM {} \
             WHERE post_type = 'attachment' AND post_parent = ? \
             AND (post_title LIKE ? OR post_excerpt LIKE ? OR post_content LIKE ?)",
            self.table("posts")
        ))
        .bind(parent)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to look up attachments of post {}", parent))?;

        rows.iter()
            .map(|row| -> Result<Attachment> {
                Ok(Attachment {
                    id: row.try_get("ID")?,
                    parent: row.try_get("post_parent")?,
                    title: row.try_get("post_title")?,
                    content: row.try_get("post_content")?,
                    menu_order: row.try_get("menu_order")?,
                    mime_type: row.try_get("post_mime_type")?,
                })
            })
            .collect()
    }

    async fn update_attachment(&self, attachment_id: u64, update: &AttachmentUpdate) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "UPDATE {} SET post_title = ?, post_content = ?, menu_order = ?, \
             post_modified = NOW(), post_modified_gmt = UTC_TIMESTAMP() \
             WHERE ID = ? AND post_type = 'attachment'",
            self.table("posts")
        ))
        .bind(&update.title)
        .bind(&update.content)
        .bind(update.menu_order)
        .bind(attachment_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update attachment {}", attachment_id))?;

        // Same semantics as update_post_meta: update every existing row for
        // the key, insert one if there is none.
        let postmeta = self.table("postmeta");
        let existing: Option<u64> = sqlx::query_scalar(&format!(
            "SELECT meta_id FROM {} WHERE post_id = ? AND meta_key = ? LIMIT 1",
            postmeta
        ))
        .bind(attachment_id)
        .bind(ALT_TEXT_META_KEY)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            sqlx::query(&format!(
                "UPDATE {} SET meta_value = ? WHERE post_id = ? AND meta_key = ?",
                postmeta
            ))
            .bind(&update.alt_text)
            .bind(attachment_id)
            .bind(ALT_TEXT_META_KEY)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(&format!(
                "INSERT INTO {} (post_id, meta_key, meta_value) VALUES (?, ?, ?)",
                postmeta
            ))
            .bind(attachment_id)
            .bind(ALT_TEXT_META_KEY)
            .bind(&update.alt_text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_post_content(&self, post_id: u64, content: &str) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET post_content = ?, post_modified = NOW(), \
             post_modified_gmt = UTC_TIMESTAMP() WHERE ID = ?",
            self.table("posts")
        ))
        .bind(content)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update post {}", post_id))?;
        Ok(())
    }

    async fn end_batch(&self) -> Result<()> {
        // Each batch only borrows pooled connections; nothing else is retained.
        tracing::debug!(
            connections = self.pool.size(),
            idle = self.pool.num_idle(),
            "batch finished"
        );
        Ok(())
    }
}

#[async_trait]
impl LegacyStore for WordPressDb {
    async fn gallery(&self, gallery_id: u64) -> Result<Option<LegacyGallery>> {
        let row = sqlx::query(&format!(
            "SELECT CAST(gid AS UNSIGNED) AS gid, COALESCE(path, '') AS path FROM {} WHERE gid = ?",
            self.table("ngg_gallery")
        ))
        .bind(gallery_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<LegacyGallery> {
            Ok(LegacyGallery {
                gid: row.try_get("gid")?,
                path: row.try_get("path")?,
            })
        })
        .transpose()
    }

    async fn images(&self, gallery_id: u64) -> Result<Vec<LegacyImage>> {
        let rows = sqlx::query(&format!(
            "SELECT CAST(pid AS UNSIGNED) AS pid, CAST(galleryid AS UNSIGNED) AS galleryid, \
             filename, COALESCE(description, '') AS description, \
             COALESCE(alttext, '') AS alttext, CAST(sortorder AS SIGNED) AS sortorder \
             FROM {} WHERE galleryid = ? ORDER BY sortorder, pid ASC",
            self.table("ngg_pictures")
        ))
        .bind(gallery_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<LegacyImage> {
                Ok(LegacyImage {
                    pid: row.try_get("pid")?,
                    gallery_id: row.try_get("galleryid")?,
                    filename: row.try_get("filename")?,
                    description: row.try_get("description")?,
                    alt_text: row.try_get("alttext")?,
                    sort_order: row.try_get("sortorder")?,
                })
            })
            .collect()
    }

    async fn counts(&self) -> Result<(u64, u64)> {
        let galleries: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            self.table("ngg_gallery")
        ))
        .fetch_one(&self.pool)
        .await
        .context("Failed to count NGG galleries")?;
        let images: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            self.table("ngg_pictures")
        ))
        .fetch_one(&self.pool)
        .await
        .context("Failed to count NGG images")?;
        Ok((galleries as u64, images as u64))
    }
}
