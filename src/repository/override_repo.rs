// ==========================================
// 反应釜批次排程看板 - 单批次覆写仓储
// ==========================================
// 职责: 管理 schedule_overrides 表 (主键 "{reactor_id}-{batch_number}")
// 说明: 无法解析的主键/时间/牌号只记录告警，不阻断加载
// ==========================================

use crate::config::parse_timestamp;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::schedule::{ItemConfig, ItemKey};
use crate::domain::types::{Grade, ItemMode};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 覆写行（原始列值）
#[derive(Debug, Clone)]
struct OverrideRow {
    id: String,
    override_time: Option<String>,
    is_skipped: bool,
    mode: Option<String>,
    grade: Option<String>,
    note: Option<String>,
    shift_subsequent: bool,
    manual_delay_minutes: Option<i64>,
    stage_info: Option<String>,
}

impl OverrideRow {
    /// 转换为领域对象；主键无法解析时返回 None
    fn into_domain(self) -> Option<(ItemKey, ItemConfig)> {
        let key = match self.id.parse::<ItemKey>() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("忽略无法解析的覆写记录: {}", e);
                return None;
            }
        };

        let override_time = self.override_time.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                tracing::warn!(item = %key, raw, "覆写时间无法解析，按无覆写处理");
            }
            parsed
        });

        let grade = self.grade.as_deref().and_then(|raw| {
            let parsed = Grade::parse(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                tracing::warn!(item = %key, raw, "未知牌号，按看板当前牌号处理");
            }
            parsed
        });

        let config = ItemConfig {
            override_time,
            is_skipped: Some(self.is_skipped),
            mode: Some(
                self.mode
                    .as_deref()
                    .map(ItemMode::from_str)
                    .unwrap_or_default(),
            ),
            grade,
            note: self.note,
            stage_info: self.stage_info,
            shift_subsequent: Some(self.shift_subsequent),
            manual_delay_minutes: self.manual_delay_minutes,
        };
        Some((key, config))
    }
}

pub struct ScheduleOverrideRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleOverrideRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        init_schema(&conn)?;
        Ok(())
    }

    /// 查询全部覆写
    pub fn list_all(&self) -> RepositoryResult<Vec<(ItemKey, ItemConfig)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, override_time, is_skipped, mode, grade, note,
                   shift_subsequent, manual_delay_minutes, stage_info
            FROM schedule_overrides
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], map_row)?;
        let mut result = Vec::new();
        for row in rows {
            if let Some(entry) = row?.into_domain() {
                result.push(entry);
            }
        }
        Ok(result)
    }

    /// 按主键查询
    pub fn find_by_key(&self, key: &ItemKey) -> RepositoryResult<Option<ItemConfig>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, override_time, is_skipped, mode, grade, note,
                       shift_subsequent, manual_delay_minutes, stage_info
                FROM schedule_overrides
                WHERE id = ?1
                "#,
                params![key.to_string()],
                map_row,
            )
            .optional()?;

        Ok(row.and_then(OverrideRow::into_domain).map(|(_, cfg)| cfg))
    }

    /// 创建或更新覆写（Upsert）
    pub fn upsert(&self, key: &ItemKey, config: &ItemConfig) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        conn.execute(
            r#"
            INSERT INTO schedule_overrides (
                id, override_time, is_skipped, mode, grade, note,
                shift_subsequent, manual_delay_minutes, stage_info, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                override_time = excluded.override_time,
                is_skipped = excluded.is_skipped,
                mode = excluded.mode,
                grade = excluded.grade,
                note = excluded.note,
                shift_subsequent = excluded.shift_subsequent,
                manual_delay_minutes = excluded.manual_delay_minutes,
                stage_info = excluded.stage_info,
                updated_at = excluded.updated_at
            "#,
            params![
                key.to_string(),
                config
                    .override_time
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
                config.is_skipped(),
                config.mode().as_str(),
                config.grade.map(|g| g.as_str()),
                config.note,
                config.shifts_subsequent(),
                config.manual_delay_minutes.unwrap_or(0),
                config.stage_info,
                now,
            ],
        )?;
        Ok(())
    }

    /// 删除单条覆写
    ///
    /// # 返回
    /// - 实际删除的行数（0 或 1）
    pub fn delete(&self, key: &ItemKey) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM schedule_overrides WHERE id = ?1",
            params![key.to_string()],
        )?;
        Ok(affected)
    }

    /// 批量删除覆写（单事务）
    pub fn delete_many(&self, keys: &[ItemKey]) -> RepositoryResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM schedule_overrides WHERE id = ?1")?;
            for key in keys {
                count += stmt.execute(params![key.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// 清空全部覆写
    pub fn delete_all(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM schedule_overrides", [])?;
        Ok(affected)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OverrideRow> {
    Ok(OverrideRow {
        id: row.get(0)?,
        override_time: row.get(1)?,
        is_skipped: row.get(2)?,
        mode: row.get(3)?,
        grade: row.get(4)?,
        note: row.get(5)?,
        shift_subsequent: row.get(6)?,
        manual_delay_minutes: row.get(7)?,
        stage_info: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repo() -> ScheduleOverrideRepository {
        let conn = Connection::open_in_memory().unwrap();
        ScheduleOverrideRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_upsert_then_find() {
        let repo = repo();
        let key = ItemKey::new("S", 5164);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 6, 20, 0).unwrap();
        let config = ItemConfig {
            override_time: Some(t),
            is_skipped: Some(false),
            mode: Some(ItemMode::Open),
            grade: Some(Grade::Slk),
            note: Some("late feed".to_string()),
            stage_info: Some("Sample Blowing".to_string()),
            shift_subsequent: Some(true),
            manual_delay_minutes: Some(20),
        };

        repo.upsert(&key, &config).unwrap();
        assert_eq!(repo.find_by_key(&key).unwrap(), Some(config.clone()));

        let mut updated = config;
        updated.is_skipped = Some(true);
        repo.upsert(&key, &updated).unwrap();
        assert_eq!(repo.list_all().unwrap(), vec![(key, updated)]);
    }

    #[test]
    fn test_delete_variants() {
        let repo = repo();
        for batch in 1..=4 {
            repo.upsert(&ItemKey::new("T", batch), &ItemConfig::skipped())
                .unwrap();
        }
        assert_eq!(repo.delete(&ItemKey::new("T", 1)).unwrap(), 1);
        assert_eq!(repo.delete(&ItemKey::new("T", 1)).unwrap(), 0);
        assert_eq!(
            repo.delete_many(&[ItemKey::new("T", 2), ItemKey::new("T", 3)])
                .unwrap(),
            2
        );
        assert_eq!(repo.delete_all().unwrap(), 1);
        assert!(repo.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rows_are_tolerated() {
        let repo = repo();
        {
            let conn = repo.get_conn().unwrap();
            conn.execute(
                "INSERT INTO schedule_overrides (id, override_time, grade) VALUES ('broken', NULL, NULL)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO schedule_overrides (id, override_time, grade) VALUES ('U-9', 'not a time', 'XX')",
                [],
            )
            .unwrap();
        }

        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 1);
        let (key, config) = &all[0];
        assert_eq!(key, &ItemKey::new("U", 9));
        assert_eq!(config.override_time, None);
        assert_eq!(config.grade, None);
    }
}
