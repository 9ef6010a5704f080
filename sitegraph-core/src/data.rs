use crate::rank::{RankedPage, ReferenceGraph};
use rusqlite::{Connection, OptionalExtension, Result, params};
use sitegraph_scanner::{Page, PageMetadata, SourceType};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub seed_url: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: SessionStatus,
    pub configuration: Option<String>,
}

/// A stored score row: `(rank, page_id, url, score)`.
pub type ScoreRow = (i64, String, String, f64);

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS crawl_sessions (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    seed_url TEXT NOT NULL,
    configuration TEXT        -- JSON configuration used
);

CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    page_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    content TEXT,
    is_error BOOLEAN NOT NULL DEFAULT 0,
    error_message TEXT,
    source_type TEXT NOT NULL CHECK(source_type IN ('web', 'local')),
    fetched_at INTEGER NOT NULL,

    FOREIGN KEY(session_id) REFERENCES crawl_sessions(id) ON DELETE CASCADE,
    UNIQUE(session_id, page_id)
);

CREATE INDEX IF NOT EXISTS idx_pages_session ON pages(session_id);
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(session_id, url);

-- Reference edges: source page text contains the target URL
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    source_page_id TEXT NOT NULL,
    target_page_id TEXT NOT NULL,

    FOREIGN KEY(session_id) REFERENCES crawl_sessions(id) ON DELETE CASCADE,
    UNIQUE(session_id, source_page_id, target_page_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_session ON edges(session_id);

CREATE TABLE IF NOT EXISTS scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    page_id TEXT NOT NULL,
    score REAL NOT NULL,
    rank INTEGER NOT NULL,

    FOREIGN KEY(session_id) REFERENCES crawl_sessions(id) ON DELETE CASCADE,
    UNIQUE(session_id, page_id)
);

CREATE INDEX IF NOT EXISTS idx_scores_session ON scores(session_id, rank);
            ",
        )?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, seed_url: &str, configuration: Option<&str>) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO crawl_sessions (id, start_time, status, seed_url, configuration) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &session_id,
                timestamp,
                SessionStatus::Running.as_str(),
                seed_url,
                configuration
            ],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, SessionStatus::Completed)
    }

    pub fn fail_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, SessionStatus::Failed)
    }

    fn finish_session(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE crawl_sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status.as_str(), timestamp, session_id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, seed_url, start_time, end_time, status, configuration
             FROM crawl_sessions WHERE id = ?1",
        )?;

        stmt.query_row(params![session_id], |row| {
            let status: String = row.get(4)?;
            Ok(SessionInfo {
                id: row.get(0)?,
                seed_url: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                status: SessionStatus::parse(&status),
                configuration: row.get(5)?,
            })
        })
        .optional()
    }

    /// Session ids, newest first.
    pub fn list_sessions(&self) -> Result<Vec<(String, String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, seed_url, status FROM crawl_sessions ORDER BY start_time DESC, rowid DESC",
        )?;

        let sessions = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(sessions)
    }

    // Page operations
    pub fn insert_pages(&self, session_id: &str, pages: &[Page]) -> Result<usize> {
        let timestamp = current_timestamp();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO pages (
                    session_id, page_id, url, title, source, content,
                    is_error, error_message, source_type, fetched_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for page in pages {
                stmt.execute(params![
                    session_id,
                    &page.id,
                    &page.url,
                    &page.metadata.title,
                    &page.metadata.source,
                    &page.content,
                    page.is_error,
                    &page.error_message,
                    page.source_type.as_str(),
                    timestamp,
                ])?;
            }
        }
        tx.commit()?;
        Ok(pages.len())
    }

    pub fn get_pages_by_session(&self, session_id: &str) -> Result<Vec<Page>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_id, url, title, source, content, is_error, error_message, source_type
             FROM pages WHERE session_id = ?1 ORDER BY id",
        )?;

        let pages = stmt
            .query_map(params![session_id], |row| {
                let source_type: String = row.get(7)?;
                Ok(Page {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    metadata: PageMetadata {
                        title: row.get(2)?,
                        source: row.get(3)?,
                    },
                    content: row.get(4)?,
                    is_error: row.get(5)?,
                    error_message: row.get(6)?,
                    source_type: if source_type == "local" {
                        SourceType::Local
                    } else {
                        SourceType::Web
                    },
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(pages)
    }

    // Graph operations
    pub fn insert_edges(
        &self,
        session_id: &str,
        pages: &[Page],
        graph: &ReferenceGraph,
    ) -> Result<usize> {
        let edges = graph.edges();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO edges (session_id, source_page_id, target_page_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (from, to) in &edges {
                stmt.execute(params![session_id, &pages[*from].id, &pages[*to].id])?;
            }
        }
        tx.commit()?;
        Ok(edges.len())
    }

    pub fn get_edges_by_session(&self, session_id: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_page_id, target_page_id FROM edges WHERE session_id = ?1 ORDER BY id",
        )?;

        let edges = stmt
            .query_map(params![session_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(edges)
    }

    pub fn insert_scores(&self, session_id: &str, ranked: &[RankedPage]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO scores (session_id, page_id, score, rank)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (idx, entry) in ranked.iter().enumerate() {
                stmt.execute(params![
                    session_id,
                    &entry.page.id,
                    entry.score,
                    (idx + 1) as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(ranked.len())
    }

    pub fn get_top_pages(&self, session_id: &str, limit: usize) -> Result<Vec<ScoreRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.rank, s.page_id, p.url, s.score
             FROM scores s
             JOIN pages p ON p.session_id = s.session_id AND p.page_id = s.page_id
             WHERE s.session_id = ?1
             ORDER BY s.rank
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![session_id, limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(rows)
    }
}
