use rusqlite::Connection;

use crate::error::Result;

/// Initialise every table this process owns. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_chats_table(conn)?;
    create_messages_table(conn)?;
    create_registered_groups_table(conn)?;
    create_sessions_table(conn)?;
    create_tasks_table(conn)?;
    create_kb_tables(conn)?;
    create_sync_markers_table(conn)?;
    Ok(())
}

fn create_chats_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chats (
            jid               TEXT PRIMARY KEY,
            display_name      TEXT NOT NULL,
            last_message_time TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id             TEXT PRIMARY KEY,
            chat_jid       TEXT NOT NULL,
            sender_name    TEXT NOT NULL,
            from_assistant INTEGER NOT NULL DEFAULT 0,
            content        TEXT NOT NULL,
            timestamp      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
            ON messages(chat_jid, timestamp);
        CREATE INDEX IF NOT EXISTS idx_messages_ts
            ON messages(timestamp);",
    )?;
    Ok(())
}

fn create_registered_groups_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS registered_groups (
            jid           TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            folder        TEXT NOT NULL UNIQUE,
            trigger_word  TEXT NOT NULL,
            added_at      TEXT NOT NULL,
            extra_mounts  TEXT NOT NULL DEFAULT '[]'
        );",
    )?;
    Ok(())
}

fn create_sessions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            folder     TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_tasks_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
            id             TEXT NOT NULL PRIMARY KEY,
            group_folder   TEXT NOT NULL,
            chat_jid       TEXT NOT NULL,
            prompt         TEXT NOT NULL,
            schedule_type  TEXT NOT NULL,
            schedule_value TEXT NOT NULL,
            timezone       TEXT NOT NULL DEFAULT 'UTC',
            context_mode   TEXT NOT NULL DEFAULT 'group',
            next_run       TEXT,
            status         TEXT NOT NULL DEFAULT 'active',
            created_at     TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_tasks_next_run ON tasks(next_run);
        CREATE INDEX IF NOT EXISTS idx_tasks_group ON tasks(group_folder);",
    )?;
    Ok(())
}

fn create_kb_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kb_sources (
            id            TEXT PRIMARY KEY,
            group_folder  TEXT NOT NULL,
            url           TEXT,
            title         TEXT NOT NULL,
            source_type   TEXT NOT NULL,
            raw_content   TEXT NOT NULL,
            content_hash  TEXT NOT NULL,
            tags          TEXT NOT NULL DEFAULT '[]',
            truncated     INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            UNIQUE(group_folder, content_hash),
            UNIQUE(group_folder, url)
        );
        CREATE INDEX IF NOT EXISTS idx_kb_sources_group
            ON kb_sources(group_folder);

        CREATE TABLE IF NOT EXISTS kb_chunks (
            id                 TEXT PRIMARY KEY,
            source_id          TEXT NOT NULL REFERENCES kb_sources(id) ON DELETE CASCADE,
            chunk_index        INTEGER NOT NULL,
            content            TEXT NOT NULL,
            embedding          BLOB,
            embedding_dim      INTEGER,
            embedding_provider TEXT,
            embedding_model    TEXT,
            created_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_kb_chunks_source
            ON kb_chunks(source_id);",
    )?;
    Ok(())
}

fn create_sync_markers_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_markers (
            name       TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}
