use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader, Split},
    sync::Mutex,
};

use crate::domain::Item;

/// Supplies new candidates when the pipeline drains.
pub trait DiscoverySource: Send + Sync {
    fn request_more(&self) -> BoxFuture<'_, Result<Vec<Item>>>;
}

/// Pages items out of a JSON-lines file, one `{"id", "text"}` object per line.
pub struct FeedSource {
    path: PathBuf,
    page_size: usize,
    cursor: Mutex<FeedCursor>,
}

struct FeedCursor {
    lines: Split<BufReader<File>>,
    line_no: usize,
}

impl FeedSource {
    pub async fn open(path: impl AsRef<Path>, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .with_context(|| format!("failed to open feed {}", path.display()))?;
        Ok(Self {
            path,
            page_size: page_size.max(1),
            cursor: Mutex::new(FeedCursor {
                lines: BufReader::new(file).split(b'\n'),
                line_no: 0,
            }),
        })
    }

    pub async fn next_page(&self) -> Result<Vec<Item>> {
        let mut cursor = self.cursor.lock().await;
        let mut page = Vec::with_capacity(self.page_size);
        while page.len() < self.page_size {
            let bytes = match cursor.lines.next_segment().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(err) if page.is_empty() => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("failed to read feed {}", self.path.display())));
                }
                Err(err) => {
                    tracing::warn!(target: "feed", error = %err, "feed read failed; returning partial page");
                    break;
                }
            };
            cursor.line_no += 1;
            let line_no = cursor.line_no;
            let Ok(line) = String::from_utf8(bytes) else {
                tracing::warn!(target: "feed", line_no, "skipping feed line that is not UTF-8");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Item>(line) {
                Ok(item) => match normalize(item) {
                    Some(item) => page.push(item),
                    None => tracing::warn!(target: "feed", line_no, "skipping item without id or text"),
                },
                Err(err) => {
                    tracing::warn!(target: "feed", error = %err, line_no, "skipping undecodable feed line")
                }
            }
        }
        tracing::debug!(target: "feed", items = page.len(), "feed page loaded");
        Ok(page)
    }
}

impl DiscoverySource for FeedSource {
    fn request_more(&self) -> BoxFuture<'_, Result<Vec<Item>>> {
        Box::pin(self.next_page())
    }
}

fn normalize(item: Item) -> Option<Item> {
    let id = item.id.trim();
    let text = item.text.trim();
    if id.is_empty() || text.is_empty() {
        return None;
    }
    Some(Item::new(id, text))
}
