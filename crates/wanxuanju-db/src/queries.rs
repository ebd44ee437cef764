use crate::Database;
use crate::models::{AnnouncementRow, AttachmentRow, UserMetaRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        provider_meta: &str,
        email_confirmed: bool,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, provider_meta, email_confirmed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, email, password_hash, provider_meta, email_confirmed, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn mark_email_confirmed(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET email_confirmed = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- User metadata --

    pub fn get_user_meta(&self, user_id: &str) -> Result<Option<UserMetaRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT user_id, full_name, role FROM user_meta_info WHERE user_id = ?1")?;
            let row = stmt
                .query_row([user_id], |row| {
                    Ok(UserMetaRow {
                        user_id: row.get(0)?,
                        full_name: row.get(1)?,
                        role: row.get(2)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn insert_user_meta(&self, user_id: &str, full_name: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_meta_info (user_id, full_name, role) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, full_name, role],
            )?;
            Ok(())
        })
    }

    // -- Announcements --

    pub fn insert_announcement(&self, id: &str, title: &str, body: &str, created_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO announcements (id, title, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, title, body, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_announcement(&self, id: &str) -> Result<Option<AnnouncementRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, title, body, created_at FROM announcements WHERE id = ?1")?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(AnnouncementRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        body: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_announcements(&self) -> Result<Vec<AnnouncementRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, body, created_at FROM announcements ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(AnnouncementRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        body: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_announcement(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
            Ok(n)
        })
    }

    // -- Attachments --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_attachment(
        &self,
        id: &str,
        announcement_id: &str,
        file_name: &str,
        storage_path: &str,
        file_url: &str,
        file_size: i64,
        file_type: &str,
        display_order: i32,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO announcement_attachments
                     (id, announcement_id, file_name, storage_path, file_url,
                      file_size, file_type, display_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id,
                    announcement_id,
                    file_name,
                    storage_path,
                    file_url,
                    file_size,
                    file_type,
                    display_order,
                    created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, announcement_id, file_name, storage_path, file_url,
                        file_size, file_type, display_order, created_at
                 FROM announcement_attachments WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_attachment_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_attachments(&self, announcement_id: &str) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, announcement_id, file_name, storage_path, file_url,
                        file_size, file_type, display_order, created_at
                 FROM announcement_attachments
                 WHERE announcement_id = ?1
                 ORDER BY display_order, created_at",
            )?;
            let rows = stmt
                .query_map([announcement_id], map_attachment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_attachment(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM announcement_attachments WHERE id = ?1", [id])?;
            Ok(n)
        })
    }

    pub fn delete_attachments_for(&self, announcement_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM announcement_attachments WHERE announcement_id = ?1",
                [announcement_id],
            )?;
            Ok(n)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, provider_meta, email_confirmed, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                provider_meta: row.get(3)?,
                email_confirmed: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_attachment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttachmentRow> {
    Ok(AttachmentRow {
        id: row.get(0)?,
        announcement_id: row.get(1)?,
        file_name: row.get(2)?,
        storage_path: row.get(3)?,
        file_url: row.get(4)?,
        file_size: row.get(5)?,
        file_type: row.get(6)?,
        display_order: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
