//! SQLite-backed artifact cache.
//!
//! Transcripts, index metadata and index entries live in three tables. A
//! `put` rewrites all rows for one item inside a single transaction.

use super::{ArtifactCache, CacheEntry, CachedItem};
use crate::chunking::Chunk;
use crate::content::{ContentId, SourceKind, SourceRef};
use crate::error::{EarshotError, Result};
use crate::index::{Index, IndexEntry, IndexFingerprint};
use crate::transcription::Transcript;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS transcripts (
        content_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        source_kind TEXT NOT NULL,
        locator TEXT NOT NULL,
        transcript_json TEXT NOT NULL,
        duration_seconds REAL NOT NULL,
        cached_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS indexes (
        content_id TEXT PRIMARY KEY REFERENCES transcripts(content_id),
        embedding_model TEXT NOT NULL,
        dimension INTEGER NOT NULL,
        chunk_size INTEGER NOT NULL,
        chunk_overlap INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS index_entries (
        content_id TEXT NOT NULL,
        sequence INTEGER NOT NULL,
        start_offset INTEGER NOT NULL,
        end_offset INTEGER NOT NULL,
        start_seconds REAL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (content_id, sequence)
    );

    CREATE INDEX IF NOT EXISTS idx_transcripts_cached_at ON transcripts(cached_at);
"#;

/// SQLite-based artifact cache.
pub struct SqliteArtifactCache {
    conn: Mutex<Connection>,
}

impl SqliteArtifactCache {
    /// Open (or create) a cache database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized artifact cache at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EarshotError::Cache(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(EarshotError::Cache(format!(
                "embedding blob of {} bytes is not a whole number of f32 values",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn parse_kind(kind: &str) -> Result<SourceKind> {
        match kind {
            "youtube" => Ok(SourceKind::YouTube),
            "local" => Ok(SourceKind::Local),
            other => Err(EarshotError::Cache(format!("unknown source kind '{}'", other))),
        }
    }

    fn parse_time(value: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| EarshotError::Cache(format!("invalid timestamp '{}': {}", value, e)))
    }

    fn load_index(conn: &Connection, content_id: &ContentId) -> Result<Option<Index>> {
        let fingerprint = conn
            .query_row(
                "SELECT embedding_model, dimension, chunk_size, chunk_overlap
                 FROM indexes WHERE content_id = ?1",
                params![content_id.as_str()],
                |row| {
                    Ok(IndexFingerprint::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)? as usize,
                        row.get::<_, i64>(2)? as usize,
                        row.get::<_, i64>(3)? as usize,
                    ))
                },
            )
            .optional()?;

        let Some(fingerprint) = fingerprint else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT sequence, start_offset, end_offset, start_seconds, content, embedding
             FROM index_entries WHERE content_id = ?1 ORDER BY sequence",
        )?;
        let rows = stmt.query_map(params![content_id.as_str()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Vec<u8>>(5)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (sequence, start, end, start_seconds, text, blob) = row?;
            entries.push(IndexEntry {
                chunk: Chunk {
                    content_id: content_id.clone(),
                    sequence: sequence as usize,
                    text,
                    start: start as usize,
                    end: end as usize,
                    start_seconds,
                },
                embedding: Self::bytes_to_embedding(&blob)?,
            });
        }

        Index::from_entries(content_id.clone(), fingerprint, entries)
            .map(Some)
            .map_err(|e| EarshotError::Cache(format!("corrupt index for {}: {}", content_id, e)))
    }
}

impl ArtifactCache for SqliteArtifactCache {
    #[instrument(skip(self))]
    fn get(&self, id: &ContentId) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let row = tx
            .query_row(
                "SELECT title, source_kind, locator, transcript_json, cached_at
                 FROM transcripts WHERE content_id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, kind, locator, transcript_json, cached_at)) = row else {
            debug!("Cache miss for {}", id);
            return Ok(None);
        };

        let transcript: Transcript = serde_json::from_str(&transcript_json)?;
        // An unreadable index is rebuilt from the transcript.
        let index = Self::load_index(&tx, id).unwrap_or_else(|e| {
            warn!("Discarding unreadable cached index for {}: {}", id, e);
            None
        });
        tx.commit()?;

        debug!("Cache hit for {} (index: {})", id, index.is_some());

        Ok(Some(CacheEntry {
            source: SourceRef::new(id.clone(), Self::parse_kind(&kind)?, locator),
            title,
            transcript,
            index,
            cached_at: Self::parse_time(&cached_at)?,
        }))
    }

    #[instrument(skip(self, entry), fields(content_id = %entry.content_id()))]
    fn put(&self, entry: &CacheEntry) -> Result<()> {
        entry.validate()?;
        let transcript_json = serde_json::to_string(&entry.transcript)?;
        let id = entry.content_id().as_str();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM index_entries WHERE content_id = ?1", params![id])?;
        tx.execute("DELETE FROM indexes WHERE content_id = ?1", params![id])?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO transcripts
            (content_id, title, source_kind, locator, transcript_json, duration_seconds, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                id,
                entry.title,
                entry.source.kind.to_string(),
                entry.source.locator,
                transcript_json,
                entry.transcript.duration_seconds,
                entry.cached_at.to_rfc3339(),
            ],
        )?;

        if let Some(index) = &entry.index {
            let fingerprint = index.fingerprint();
            tx.execute(
                r#"
                INSERT INTO indexes (content_id, embedding_model, dimension, chunk_size, chunk_overlap)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    id,
                    fingerprint.model,
                    fingerprint.dimension as i64,
                    fingerprint.chunk_size as i64,
                    fingerprint.chunk_overlap as i64,
                ],
            )?;

            let mut stmt = tx.prepare(
                r#"
                INSERT INTO index_entries
                (content_id, sequence, start_offset, end_offset, start_seconds, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for e in index.entries() {
                stmt.execute(params![
                    id,
                    e.chunk.sequence as i64,
                    e.chunk.start as i64,
                    e.chunk.end as i64,
                    e.chunk.start_seconds,
                    e.chunk.text,
                    Self::embedding_to_bytes(&e.embedding),
                ])?;
            }
        }

        tx.commit()?;

        debug!(
            "Cached {} ({} indexed chunks)",
            id,
            entry.index.as_ref().map(|i| i.len()).unwrap_or(0)
        );
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, id: &ContentId) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM index_entries WHERE content_id = ?1", params![id.as_str()])?;
        tx.execute("DELETE FROM indexes WHERE content_id = ?1", params![id.as_str()])?;
        let removed = tx.execute(
            "DELETE FROM transcripts WHERE content_id = ?1",
            params![id.as_str()],
        )?;

        tx.commit()?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<CachedItem>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT t.content_id, t.title, t.source_kind, t.locator, t.duration_seconds, t.cached_at,
                   CASE WHEN i.content_id IS NULL THEN NULL
                        ELSE (SELECT COUNT(*) FROM index_entries e WHERE e.content_id = t.content_id)
                   END
            FROM transcripts t
            LEFT JOIN indexes i ON i.content_id = t.content_id
            ORDER BY t.cached_at DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<i64>>(6)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, title, kind, locator, duration_seconds, cached_at, chunk_count) = row?;
            items.push(CachedItem {
                source: SourceRef::new(ContentId::new(id), Self::parse_kind(&kind)?, locator),
                title,
                duration_seconds,
                chunk_count: chunk_count.map(|c| c as usize),
                cached_at: Self::parse_time(&cached_at)?,
            });
        }

        Ok(items)
    }
}
