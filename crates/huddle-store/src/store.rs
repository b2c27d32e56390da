use std::sync::Mutex;

use huddle_core::types::{
    Chat, ContextMode, ExtraMount, Jid, KbChunk, KbSource, RegisteredGroup, ScheduleType, Session,
    SourceType, Task, TaskStatus,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use crate::error::{Result, StoreError};

/// Single-writer embedded store: chats, messages, registered groups,
/// sessions, tasks, and the knowledge base. All writes go through one
/// `Mutex<Connection>` so the store never partially writes a row; reads take
/// the same lock since rusqlite connections aren't `Sync` across threads,
/// but SQLite itself serves them without blocking writers for long.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Open (creating if absent) and initialise the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // ---------------------------------------------------------------
    // Chats
    // ---------------------------------------------------------------

    #[instrument(skip(self, chat), fields(jid = %chat.jid))]
    pub fn upsert_chat(&self, chat: &Chat) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO chats (jid, display_name, last_message_time)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(jid) DO UPDATE SET
                display_name = excluded.display_name,
                last_message_time = excluded.last_message_time
             WHERE excluded.last_message_time >= chats.last_message_time",
            params![
                chat.jid.as_str(),
                chat.display_name,
                chat.last_message_time.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn list_chats(&self) -> Result<Vec<Chat>> {
        let db = self.db.lock().unwrap();
        let mut stmt =
            db.prepare("SELECT jid, display_name, last_message_time FROM chats")?;
        let rows = stmt.query_map([], row_to_chat)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------

    /// Append a message. The caller never mutates a stored row afterward
    /// (messages are append-only).
    #[instrument(skip(self, msg), fields(chat = %msg.chat_jid, id = %msg.id))]
    pub fn store_message(&self, msg: &huddle_core::types::Message) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO messages
             (id, chat_jid, sender_name, from_assistant, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                msg.id,
                msg.chat_jid.as_str(),
                msg.sender_name,
                msg.from_assistant as i64,
                msg.content,
                msg.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Messages strictly newer than `since_ts`, across any of
    /// `registered_jids`, excluding any whose `sender_name` is a bot prefix
    /// (self-loop guard). Ordered by timestamp ascending.
    #[instrument(skip(self, registered_jids, bot_prefixes))]
    pub fn get_new_messages(
        &self,
        registered_jids: &[Jid],
        since_ts: chrono::DateTime<chrono::Utc>,
        bot_prefixes: &[String],
    ) -> Result<Vec<huddle_core::types::Message>> {
        if registered_jids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let placeholders = registered_jids
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT id, chat_jid, sender_name, from_assistant, content, timestamp
             FROM messages
             WHERE timestamp > ? AND chat_jid IN ({placeholders})
             ORDER BY timestamp ASC"
        );
        let mut stmt = db.prepare(&sql)?;
        let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(registered_jids.len() + 1);
        let since_str = since_ts.to_rfc3339();
        bound.push(&since_str);
        let jid_strs: Vec<&str> = registered_jids.iter().map(|j| j.as_str()).collect();
        for j in &jid_strs {
            bound.push(j);
        }
        let rows = stmt.query_map(bound.as_slice(), row_to_message)?;
        let all: Vec<huddle_core::types::Message> = rows.filter_map(|r| r.ok()).collect();
        Ok(all
            .into_iter()
            .filter(|m| !bot_prefixes.iter().any(|p| m.sender_name == *p))
            .collect())
    }

    /// Full context window for one chat: every message from `since_ts`
    /// through now, excluding bot-authored messages.
    #[instrument(skip(self, bot_prefixes), fields(jid = %jid))]
    pub fn get_messages_since(
        &self,
        jid: &Jid,
        since_ts: chrono::DateTime<chrono::Utc>,
        bot_prefixes: &[String],
    ) -> Result<Vec<huddle_core::types::Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, chat_jid, sender_name, from_assistant, content, timestamp
             FROM messages
             WHERE chat_jid = ?1 AND timestamp > ?2
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(
            params![jid.as_str(), since_ts.to_rfc3339()],
            row_to_message,
        )?;
        let all: Vec<huddle_core::types::Message> = rows.filter_map(|r| r.ok()).collect();
        Ok(all
            .into_iter()
            .filter(|m| !bot_prefixes.iter().any(|p| m.sender_name == *p))
            .collect())
    }

    // ---------------------------------------------------------------
    // Registered groups
    // ---------------------------------------------------------------

    #[instrument(skip(self, group), fields(folder = %group.folder))]
    pub fn register_group(&self, group: &RegisteredGroup) -> Result<()> {
        let db = self.db.lock().unwrap();
        let mounts = serde_json::to_string(&group.extra_mounts)?;
        db.execute(
            "INSERT INTO registered_groups
             (jid, name, folder, trigger_word, added_at, extra_mounts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(jid) DO UPDATE SET
                name = excluded.name,
                folder = excluded.folder,
                trigger_word = excluded.trigger_word,
                extra_mounts = excluded.extra_mounts",
            params![
                group.jid.as_str(),
                group.name,
                group.folder.as_str(),
                group.trigger,
                group.added_at.to_rfc3339(),
                mounts,
            ],
        )?;
        Ok(())
    }

    pub fn unregister_group(&self, jid: &Jid) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM registered_groups WHERE jid = ?1",
            params![jid.as_str()],
        )?;
        Ok(())
    }

    pub fn get_registered_group(&self, jid: &Jid) -> Result<Option<RegisteredGroup>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT jid, name, folder, trigger_word, added_at, extra_mounts
             FROM registered_groups WHERE jid = ?1",
            params![jid.as_str()],
            row_to_registered_group,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn list_registered_groups(&self) -> Result<Vec<RegisteredGroup>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT jid, name, folder, trigger_word, added_at, extra_mounts
             FROM registered_groups",
        )?;
        let rows = stmt.query_map([], row_to_registered_group)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // Sessions — exactly one per group
    // ---------------------------------------------------------------

    pub fn get_session(&self, folder: &huddle_core::types::GroupFolder) -> Result<Option<Session>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT folder, session_id, updated_at FROM sessions WHERE folder = ?1",
            params![folder.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(StoreError::from)
    }

    #[instrument(skip(self), fields(folder = %folder))]
    pub fn set_session(
        &self,
        folder: &huddle_core::types::GroupFolder,
        session_id: &str,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO sessions (folder, session_id, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(folder) DO UPDATE SET
                session_id = excluded.session_id,
                updated_at = excluded.updated_at",
            params![folder.as_str(), session_id, now],
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------

    #[instrument(skip(self, task), fields(id = %task.id))]
    pub fn create_task(&self, task: &Task) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tasks
             (id, group_folder, chat_jid, prompt, schedule_type, schedule_value,
              timezone, context_mode, next_run, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                task.group_folder.as_str(),
                task.chat_jid.as_str(),
                task.prompt,
                task.schedule_type.to_string(),
                task.schedule_value,
                task.timezone,
                task.context_mode.to_string(),
                task.next_run.map(|t| t.to_rfc3339()),
                task.status.to_string(),
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, group_folder, chat_jid, prompt, schedule_type, schedule_value,
                    timezone, context_mode, next_run, status, created_at
             FROM tasks WHERE id = ?1",
            params![id],
            row_to_task,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Tasks due to fire: `status = 'active'` and `next_run <= now`.
    pub fn list_due_tasks(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, group_folder, chat_jid, prompt, schedule_type, schedule_value,
                    timezone, context_mode, next_run, status, created_at
             FROM tasks
             WHERE status = 'active' AND next_run IS NOT NULL AND next_run <= ?1
             ORDER BY next_run ASC",
        )?;
        let rows = stmt.query_map(params![now.to_rfc3339()], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn list_tasks_for_group(
        &self,
        folder: &huddle_core::types::GroupFolder,
    ) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, group_folder, chat_jid, prompt, schedule_type, schedule_value,
                    timezone, context_mode, next_run, status, created_at
             FROM tasks WHERE group_folder = ?1",
        )?;
        let rows = stmt.query_map(params![folder.as_str()], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn list_all_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, group_folder, chat_jid, prompt, schedule_type, schedule_value,
                    timezone, context_mode, next_run, status, created_at
             FROM tasks",
        )?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self))]
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE tasks SET status = ?1 WHERE id = ?2",
            params![status.to_string(), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound {
                what: format!("task {id}"),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn update_task_next_run(
        &self,
        id: &str,
        next_run: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE tasks SET next_run = ?1 WHERE id = ?2",
            params![next_run.map(|t| t.to_rfc3339()), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound {
                what: format!("task {id}"),
            });
        }
        Ok(())
    }

    pub fn delete_task(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Knowledge base
    // ---------------------------------------------------------------

    #[instrument(skip(self, source), fields(id = %source.id))]
    pub fn create_kb_source(&self, source: &KbSource) -> Result<()> {
        let db = self.db.lock().unwrap();
        let tags = serde_json::to_string(&source.tags)?;
        db.execute(
            "INSERT INTO kb_sources
             (id, group_folder, url, title, source_type, raw_content, content_hash,
              tags, truncated, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                source.id,
                source.group_folder.as_str(),
                source.url,
                source.title,
                source.source_type.to_string(),
                source.raw_content,
                source.content_hash,
                tags,
                source.truncated as i64,
                source.created_at.to_rfc3339(),
                source.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_kb_source(&self, id: &str) -> Result<Option<KbSource>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, group_folder, url, title, source_type, raw_content, content_hash,
                    tags, truncated, created_at, updated_at
             FROM kb_sources WHERE id = ?1",
            params![id],
            row_to_kb_source,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn find_kb_source_by_hash(
        &self,
        folder: &huddle_core::types::GroupFolder,
        content_hash: &str,
    ) -> Result<Option<KbSource>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, group_folder, url, title, source_type, raw_content, content_hash,
                    tags, truncated, created_at, updated_at
             FROM kb_sources WHERE group_folder = ?1 AND content_hash = ?2",
            params![folder.as_str(), content_hash],
            row_to_kb_source,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn find_kb_source_by_url(
        &self,
        folder: &huddle_core::types::GroupFolder,
        url: &str,
    ) -> Result<Option<KbSource>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, group_folder, url, title, source_type, raw_content, content_hash,
                    tags, truncated, created_at, updated_at
             FROM kb_sources WHERE group_folder = ?1 AND url = ?2",
            params![folder.as_str(), url],
            row_to_kb_source,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn list_kb_sources_for_group(
        &self,
        folder: &huddle_core::types::GroupFolder,
    ) -> Result<Vec<KbSource>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, group_folder, url, title, source_type, raw_content, content_hash,
                    tags, truncated, created_at, updated_at
             FROM kb_sources WHERE group_folder = ?1",
        )?;
        let rows = stmt.query_map(params![folder.as_str()], row_to_kb_source)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Replace title/tags in place without touching chunks (used when an
    /// update carries no new content).
    #[instrument(skip(self))]
    pub fn update_kb_source_metadata(
        &self,
        id: &str,
        title: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        if let Some(title) = title {
            db.execute(
                "UPDATE kb_sources SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now, id],
            )?;
        }
        if let Some(tags) = tags {
            let tags_json = serde_json::to_string(tags)?;
            db.execute(
                "UPDATE kb_sources SET tags = ?1, updated_at = ?2 WHERE id = ?3",
                params![tags_json, now, id],
            )?;
        }
        Ok(())
    }

    /// Atomically replace a source's content and chunks: deletes all
    /// existing chunks for `source_id`, updates the source row, and lets the
    /// caller insert the new chunks inside the same transaction.
    #[instrument(skip(self, raw_content, content_hash))]
    pub fn replace_kb_source_content(
        &self,
        id: &str,
        raw_content: &str,
        content_hash: &str,
        truncated: bool,
        new_chunks: &[KbChunk],
    ) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE kb_sources
             SET raw_content = ?1, content_hash = ?2, truncated = ?3, updated_at = ?4
             WHERE id = ?5",
            params![raw_content, content_hash, truncated as i64, now, id],
        )?;
        tx.execute("DELETE FROM kb_chunks WHERE source_id = ?1", params![id])?;
        for chunk in new_chunks {
            insert_chunk(&tx, chunk)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete_kb_source(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM kb_sources WHERE id = ?1", params![id])?;
        Ok(())
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub fn insert_kb_chunks(&self, chunks: &[KbChunk]) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        for chunk in chunks {
            insert_chunk(&tx, chunk)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_kb_chunks_for_source(&self, source_id: &str) -> Result<Vec<KbChunk>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, source_id, chunk_index, content, embedding, embedding_dim,
                    embedding_provider, embedding_model, created_at
             FROM kb_chunks WHERE source_id = ?1 ORDER BY chunk_index ASC",
        )?;
        let rows = stmt.query_map(params![source_id], row_to_kb_chunk)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Every chunk belonging to sources in `folder`, for the KB Pipeline's
    /// brute-force cosine similarity search.
    pub fn list_kb_chunks_for_group(
        &self,
        folder: &huddle_core::types::GroupFolder,
    ) -> Result<Vec<(KbSource, KbChunk)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT s.id, s.group_folder, s.url, s.title, s.source_type, s.raw_content,
                    s.content_hash, s.tags, s.truncated, s.created_at, s.updated_at,
                    c.id, c.source_id, c.chunk_index, c.content, c.embedding,
                    c.embedding_dim, c.embedding_provider, c.embedding_model, c.created_at
             FROM kb_chunks c
             JOIN kb_sources s ON s.id = c.source_id
             WHERE s.group_folder = ?1",
        )?;
        let rows = stmt.query_map(params![folder.as_str()], |row| {
            let source = row_to_kb_source_offset(row, 0)?;
            let chunk = row_to_kb_chunk_offset(row, 11)?;
            Ok((source, chunk))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // Sync markers (e.g. `last_group_sync`)
    // ---------------------------------------------------------------

    pub fn get_marker(&self, name: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT value FROM sync_markers WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn set_marker(&self, name: &str, value: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO sync_markers (name, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, value, now],
        )?;
        Ok(())
    }
}

fn insert_chunk(tx: &rusqlite::Transaction<'_>, chunk: &KbChunk) -> rusqlite::Result<()> {
    let embedding_bytes = chunk.embedding.as_ref().map(|v| pack_embedding(v));
    tx.execute(
        "INSERT INTO kb_chunks
         (id, source_id, chunk_index, content, embedding, embedding_dim,
          embedding_provider, embedding_model, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.chunk_index,
            chunk.content,
            embedding_bytes,
            chunk.embedding_dim,
            chunk.embedding_provider,
            chunk.embedding_model,
            chunk.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Little-endian f32 packing, per spec.md §3's `embedding` field contract.
pub fn pack_embedding(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

pub fn unpack_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let jid: String = row.get(0)?;
    let last_message_time: String = row.get(2)?;
    Ok(Chat {
        jid: Jid::from(jid),
        display_name: row.get(1)?,
        last_message_time: parse_ts(&last_message_time),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<huddle_core::types::Message> {
    let chat_jid: String = row.get(1)?;
    let from_assistant: i64 = row.get(3)?;
    let timestamp: String = row.get(5)?;
    Ok(huddle_core::types::Message {
        id: row.get(0)?,
        chat_jid: Jid::from(chat_jid),
        sender_name: row.get(2)?,
        from_assistant: from_assistant != 0,
        content: row.get(4)?,
        timestamp: parse_ts(&timestamp),
    })
}

fn row_to_registered_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegisteredGroup> {
    let jid: String = row.get(0)?;
    let folder: String = row.get(2)?;
    let added_at: String = row.get(4)?;
    let mounts_json: String = row.get(5)?;
    let extra_mounts: Vec<ExtraMount> = serde_json::from_str(&mounts_json).unwrap_or_default();
    Ok(RegisteredGroup {
        jid: Jid::from(jid),
        name: row.get(1)?,
        folder: huddle_core::types::GroupFolder::from(folder),
        trigger: row.get(3)?,
        added_at: parse_ts(&added_at),
        extra_mounts,
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let folder: String = row.get(0)?;
    let updated_at: String = row.get(2)?;
    Ok(Session {
        folder: huddle_core::types::GroupFolder::from(folder),
        session_id: row.get(1)?,
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    use std::str::FromStr;
    let group_folder: String = row.get(1)?;
    let chat_jid: String = row.get(2)?;
    let schedule_type: String = row.get(4)?;
    let context_mode: String = row.get(7)?;
    let next_run: Option<String> = row.get(8)?;
    let status: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    Ok(Task {
        id: row.get(0)?,
        group_folder: huddle_core::types::GroupFolder::from(group_folder),
        chat_jid: Jid::from(chat_jid),
        prompt: row.get(3)?,
        schedule_type: ScheduleType::from_str(&schedule_type).unwrap_or(ScheduleType::Once),
        schedule_value: row.get(5)?,
        timezone: row.get(6)?,
        context_mode: ContextMode::from_str(&context_mode).unwrap_or(ContextMode::Group),
        next_run: next_run.map(|t| parse_ts(&t)),
        status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Failed),
        created_at: parse_ts(&created_at),
    })
}

fn row_to_kb_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<KbSource> {
    row_to_kb_source_offset(row, 0)
}

fn row_to_kb_source_offset(row: &rusqlite::Row<'_>, off: usize) -> rusqlite::Result<KbSource> {
    use std::str::FromStr;
    let group_folder: String = row.get(off + 1)?;
    let source_type: String = row.get(off + 4)?;
    let tags_json: String = row.get(off + 7)?;
    let truncated: i64 = row.get(off + 8)?;
    let created_at: String = row.get(off + 9)?;
    let updated_at: String = row.get(off + 10)?;
    Ok(KbSource {
        id: row.get(off)?,
        group_folder: huddle_core::types::GroupFolder::from(group_folder),
        url: row.get(off + 2)?,
        title: row.get(off + 3)?,
        source_type: SourceType::from_str(&source_type).unwrap_or(SourceType::Other),
        raw_content: row.get(off + 5)?,
        content_hash: row.get(off + 6)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        truncated: truncated != 0,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_kb_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<KbChunk> {
    row_to_kb_chunk_offset(row, 0)
}

fn row_to_kb_chunk_offset(row: &rusqlite::Row<'_>, off: usize) -> rusqlite::Result<KbChunk> {
    let embedding_bytes: Option<Vec<u8>> = row.get(off + 4)?;
    let embedding_dim: Option<u32> = row.get(off + 5)?;
    let created_at: String = row.get(off + 8)?;
    Ok(KbChunk {
        id: row.get(off)?,
        source_id: row.get(off + 1)?,
        chunk_index: row.get(off + 2)?,
        content: row.get(off + 3)?,
        embedding: embedding_bytes.map(|b| unpack_embedding(&b)),
        embedding_dim,
        embedding_provider: row.get(off + 6)?,
        embedding_model: row.get(off + 7)?,
        created_at: parse_ts(&created_at),
    })
}

fn parse_ts(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::types::{GroupFolder, Message};

    fn sample_message(id: &str, chat: &str, sender: &str, ts: chrono::DateTime<chrono::Utc>) -> Message {
        Message {
            id: id.to_string(),
            chat_jid: Jid::from(chat),
            sender_name: sender.to_string(),
            from_assistant: false,
            content: "hello".to_string(),
            timestamp: ts,
        }
    }

    #[test]
    fn get_new_messages_excludes_bot_prefix_and_older_ts() {
        let store = Store::open_in_memory().unwrap();
        let base = chrono::Utc::now();
        store
            .store_message(&sample_message("m1", "g1@g.us", "alice", base))
            .unwrap();
        store
            .store_message(&sample_message(
                "m2",
                "g1@g.us",
                "Huddle",
                base + chrono::Duration::seconds(1),
            ))
            .unwrap();
        store
            .store_message(&sample_message(
                "m3",
                "g1@g.us",
                "bob",
                base + chrono::Duration::seconds(2),
            ))
            .unwrap();

        let msgs = store
            .get_new_messages(
                &[Jid::from("g1@g.us")],
                base - chrono::Duration::seconds(1),
                &["Huddle".to_string()],
            )
            .unwrap();

        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m.sender_name != "Huddle"));
    }

    #[test]
    fn task_round_trips_through_store() {
        let store = Store::open_in_memory().unwrap();
        let task = Task {
            id: "t1".to_string(),
            group_folder: GroupFolder::from("acme"),
            chat_jid: Jid::from("g1@g.us"),
            prompt: "daily standup".to_string(),
            schedule_type: ScheduleType::Cron,
            schedule_value: "0 9 * * *".to_string(),
            timezone: "UTC".to_string(),
            context_mode: ContextMode::Group,
            next_run: Some(chrono::Utc::now()),
            status: TaskStatus::Active,
            created_at: chrono::Utc::now(),
        };
        store.create_task(&task).unwrap();
        let fetched = store.get_task("t1").unwrap().unwrap();
        assert_eq!(fetched.schedule_value, "0 9 * * *");

        store.update_task_status("t1", TaskStatus::Paused).unwrap();
        let fetched = store.get_task("t1").unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Paused);
    }

    #[test]
    fn kb_source_unique_on_group_and_hash() {
        let store = Store::open_in_memory().unwrap();
        let folder = GroupFolder::from("acme");
        let now = chrono::Utc::now();
        let source = KbSource {
            id: "kb-1".to_string(),
            group_folder: folder.clone(),
            url: Some("https://example.com/a".to_string()),
            title: "A".to_string(),
            source_type: SourceType::Article,
            raw_content: "content".to_string(),
            content_hash: "hash1".to_string(),
            tags: vec![],
            truncated: false,
            created_at: now,
            updated_at: now,
        };
        store.create_kb_source(&source).unwrap();

        let dup = KbSource {
            id: "kb-2".to_string(),
            url: Some("https://example.com/b".to_string()),
            ..source.clone()
        };
        assert!(store.create_kb_source(&dup).is_err());
    }

    #[test]
    fn embedding_pack_unpack_roundtrips() {
        let v = vec![0.5f32, -1.25, 3.0];
        let packed = pack_embedding(&v);
        let unpacked = unpack_embedding(&packed);
        assert_eq!(v, unpacked);
    }
}
