//! `escape-ngg status`: what is left to migrate and whether the
//! collaborators are reachable.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::{PostFilter, PostQuery};
use crate::store::mysql::WordPressDb;
use crate::store::rest::RestMediaImporter;
use crate::store::{ContentStore, LegacyStore, MediaImporter};

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub check: String,
    pub status: String,
}

impl StatusLine {
    fn new(check: &str, status: String) -> Self {
        Self {
            check: check.to_string(),
            status,
        }
    }
}

/// Gather status rows. A failing media check is reported, not returned as
/// an error.
pub async fn collect_status(
    content: &dyn ContentStore,
    legacy: &dyn LegacyStore,
    media: Option<&dyn MediaImporter>,
    marker: &str,
) -> Result<Vec<StatusLine>> {
    let mut lines = Vec::new();

    let (galleries, images) = legacy.counts().await?;
    lines.push(StatusLine::new(
        "legacy tables",
        format!("{} galleries, {} images", galleries, images),
    ));

    let remaining = content
        .count_posts(&PostQuery {
            marker: marker.to_string(),
            filter: PostFilter::default(),
            limit: 0,
            offset: 0,
        })
        .await?;
    lines.push(StatusLine::new("posts remaining", remaining.to_string()));

    let rest = match media {
        Some(media) => match media.check().await {
            Ok(user) => format!("OK ({})", user),
            Err(e) => format!("FAILED ({:#})", e),
        },
        None => "NOT CONFIGURED".to_string(),
    };
    lines.push(StatusLine::new("rest api", rest));

    Ok(lines)
}

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let wp = WordPressDb::new(pool, &config.database.table_prefix);

    let importer = match config.site.rest_url {
        Some(_) => match RestMediaImporter::new(&config.site) {
            Ok(importer) => Some(importer),
            Err(e) => {
                eprintln!("Warning: {:#}", e);
                None
            }
        },
        None => None,
    };
    let media = importer.as_ref().map(|i| i as &dyn MediaImporter);

    let result = collect_status(&wp, &wp, media, &config.migration.marker).await;
    wp.close().await;
    let lines = result?;

    println!("{:<16} STATUS", "CHECK");
    println!("{:<16} OK", "database");
    for line in lines {
        println!("{:<16} {}", line.check, line.status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryWordPress;

    #[tokio::test]
    async fn test_collect_status() {
        let wp = InMemoryWordPress::new();
        wp.add_post(1, "[nggallery id=1]");
        wp.add_post(2, "[gallery]");
        wp.add_gallery(1, "g");
        wp.add_image(1, 1, "a.jpg", "", "", 0);
        wp.add_image(1, 2, "b.jpg", "", "", 1);

        let lines = collect_status(&wp, &wp, Some(&wp as &dyn MediaImporter), "[nggallery")
            .await
            .unwrap();
        assert_eq!(
            lines,
            vec![
                StatusLine::new("legacy tables", "1 galleries, 2 images".to_string()),
                StatusLine::new("posts remaining", "1".to_string()),
                StatusLine::new("rest api", "OK (in-memory)".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_status_without_rest() {
        let wp = InMemoryWordPress::new();
        let lines = collect_status(&wp, &wp, None, "[nggallery").await.unwrap();
        assert_eq!(lines[2].status, "NOT CONFIGURED");
    }
}
