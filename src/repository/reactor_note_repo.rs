// ==========================================
// 反应釜批次排程看板 - 反应釜备注仓储
// ==========================================
// 职责: 管理 reactor_notes 表 (reactor_id → 自由文本)
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub struct ReactorNoteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReactorNoteRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        {
            let conn = repo.get_conn()?;
            init_schema(&conn)?;
        }
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询全部备注
    pub fn list_all(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT reactor_id, note FROM reactor_notes ORDER BY reactor_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut notes = BTreeMap::new();
        for row in rows {
            let (reactor_id, note) = row?;
            notes.insert(reactor_id, note);
        }
        Ok(notes)
    }

    /// 创建或更新备注
    pub fn upsert(&self, reactor_id: &str, note: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO reactor_notes (reactor_id, note, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(reactor_id) DO UPDATE SET
                note = excluded.note,
                updated_at = excluded.updated_at
            "#,
            params![
                reactor_id,
                note,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_overwrites() {
        let conn = Connection::open_in_memory().unwrap();
        let repo = ReactorNoteRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap();

        repo.upsert("S", "USE LANCE 1").unwrap();
        repo.upsert("T", "").unwrap();
        repo.upsert("S", "USE LANCE 2").unwrap();

        let notes = repo.list_all().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes["S"], "USE LANCE 2");
        assert_eq!(notes["T"], "");
    }
}
