//! JSON lines graph sink.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use kg_ingest::{GraphSink, SinkError};
use kg_types::{GraphDocument, GraphNode, GraphRelationship, SourceDocument};

const SCAN_CHUNK: usize = 8 * 1024;

#[derive(Serialize)]
struct Record<'a> {
    nodes: &'a [GraphNode],
    relationships: &'a [GraphRelationship],
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a SourceDocument>,
}

/// Appends one JSON object per document to a file.
///
/// All lines of a commit are written with a single write and synced
/// before `commit` returns. A failed commit cuts the file back to its
/// previous length, and `open` drops an unterminated last line left by a
/// crash, so every line in the file is a complete record.
pub struct JsonlGraphSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlGraphSink {
    /// Open (or create) the output file in append mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let dropped = trim_torn_tail(&mut file).await?;
        if dropped > 0 {
            warn!(
                path = %path.display(),
                bytes = dropped,
                "Dropped unterminated last line from graph output"
            );
        }

        info!(path = %path.display(), "Opened jsonl graph sink");
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Cut `file` back to just after its last newline. Returns the number of
/// bytes removed.
async fn trim_torn_tail(file: &mut File) -> io::Result<u64> {
    let len = file.metadata().await?.len();
    let mut keep = 0;
    let mut end = len;
    let mut buf = vec![0u8; SCAN_CHUNK];

    while end > 0 {
        let start = end.saturating_sub(SCAN_CHUNK as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        file.set_len(keep).await?;
        file.sync_all().await?;
    }
    Ok(len - keep)
}

/// Append `buf` and sync it. On failure the file is cut back to the
/// length it had before, so no partial record stays behind.
async fn append_synced(file: &mut File, buf: &[u8]) -> io::Result<()> {
    let len = file.metadata().await?.len();
    let result = write_synced(file, buf).await;
    if result.is_err() {
        truncate_to(file, len).await;
    }
    result
}

async fn write_synced(file: &mut File, buf: &[u8]) -> io::Result<()> {
    file.write_all(buf).await?;
    file.flush().await?;
    file.sync_data().await
}

async fn truncate_to(file: &mut File, len: u64) {
    if let Err(e) = file.set_len(len).await {
        warn!(len = len, error = %e, "Failed to roll back partial graph write");
    }
}

#[async_trait]
impl GraphSink for JsonlGraphSink {
    async fn commit(
        &self,
        units: &[GraphDocument],
        include_source: bool,
    ) -> Result<(), SinkError> {
        if units.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for doc in units {
            let record = Record {
                nodes: &doc.nodes,
                relationships: &doc.relationships,
                source: include_source.then_some(&doc.source),
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }

        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(SinkError::Closed)?;
        append_synced(file, &buf).await?;

        debug!(documents = units.len(), bytes = buf.len(), "Appended graph documents");
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!(path = %self.path.display(), "Closed jsonl graph sink");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Read back the documents of a jsonl graph file.
///
/// An unterminated last line (a write cut short by a crash) is skipped;
/// any other line that does not parse is an `InvalidData` error. Records
/// written without their source get an empty one.
pub fn read_documents(path: impl AsRef<Path>) -> io::Result<Vec<GraphDocument>> {
    #[derive(serde::Deserialize)]
    struct StoredRecord {
        #[serde(default)]
        nodes: Vec<GraphNode>,
        #[serde(default)]
        relationships: Vec<GraphRelationship>,
        source: Option<SourceDocument>,
    }

    let text = std::fs::read_to_string(path)?;
    let torn_tail = !text.is_empty() && !text.ends_with('\n');
    let lines: Vec<&str> = text.lines().collect();

    let mut docs = Vec::with_capacity(lines.len());
    for (number, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: StoredRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(_) if torn_tail && number + 1 == lines.len() => break,
            Err(e) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line {}: {}", number + 1, e),
                ))
            }
        };
        docs.push(GraphDocument {
            nodes: record.nodes,
            relationships: record.relationships,
            source: record.source.unwrap_or(SourceDocument {
                id: String::new(),
                text: String::new(),
                metadata: Default::default(),
            }),
        });
    }
    Ok(docs)
}
