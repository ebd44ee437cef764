use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            email            TEXT NOT NULL UNIQUE,
            password         TEXT NOT NULL,
            provider_meta    TEXT NOT NULL DEFAULT '{}',
            email_confirmed  INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_meta_info (
            user_id    TEXT PRIMARY KEY REFERENCES users(id),
            full_name  TEXT NOT NULL,
            role       TEXT NOT NULL DEFAULT 'user'
        );

        CREATE TABLE IF NOT EXISTS announcements (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS announcement_attachments (
            id               TEXT PRIMARY KEY,
            announcement_id  TEXT NOT NULL REFERENCES announcements(id),
            file_name        TEXT NOT NULL,
            storage_path     TEXT NOT NULL,
            file_url         TEXT NOT NULL,
            file_size        INTEGER NOT NULL,
            file_type        TEXT NOT NULL,
            display_order    INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_announcement
            ON announcement_attachments(announcement_id, display_order);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
