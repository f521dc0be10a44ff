// ==========================================
// 反应釜批次排程看板 - 看板持久化接口
// ==========================================
// 职责: 定义看板状态的加载与镜像写入接口，并提供 SQLite / 内存两种实现
// 红线: 存储层不含业务规则，只做数据读写
// ==========================================

use crate::config::{BoardSettings, ConfigManager, ScheduleConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::schedule::{ItemConfig, ItemKey};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::override_repo::ScheduleOverrideRepository;
use crate::repository::reactor_note_repo::ReactorNoteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ==========================================
// StoredBoard - 启动加载结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBoard {
    pub settings: BoardSettings,
    pub item_configs: BTreeMap<ItemKey, ItemConfig>,
    pub reactor_notes: BTreeMap<String, String>,
    /// 设置单例是否已存在（false 表示首次启动，settings 为默认值）
    pub initialized: bool,
}

// ==========================================
// BoardStore Trait
// ==========================================
// 用途: 看板状态的启动加载与变更镜像
// 实现者: SqliteBoardStore（rusqlite）、InMemoryBoardStore（测试/无盘运行）
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// 加载设置单例、全部覆写、全部反应釜备注
    ///
    /// # 参数
    /// - now: 缺失或无法解析的基准时间以此替代
    async fn load_board(&self, now: DateTime<Utc>) -> RepositoryResult<StoredBoard>;

    /// 写回完整设置单例
    async fn save_settings(&self, settings: &BoardSettings) -> RepositoryResult<()>;

    /// 写回基准批号与开始时间
    async fn save_base(&self, batch_number: i64, start_time: DateTime<Utc>) -> RepositoryResult<()>;

    /// 创建或更新单批次覆写
    async fn upsert_override(&self, key: &ItemKey, config: &ItemConfig) -> RepositoryResult<()>;

    /// 删除单批次覆写
    async fn delete_override(&self, key: &ItemKey) -> RepositoryResult<usize>;

    /// 批量删除覆写
    async fn delete_overrides(&self, keys: &[ItemKey]) -> RepositoryResult<usize>;

    /// 清空全部覆写
    async fn delete_all_overrides(&self) -> RepositoryResult<usize>;

    /// 创建或更新反应釜备注
    async fn upsert_reactor_note(&self, reactor_id: &str, note: &str) -> RepositoryResult<()>;
}

fn config_error(err: Box<dyn Error + Send + Sync>) -> RepositoryError {
    RepositoryError::DatabaseQueryError(err.to_string())
}

// ==========================================
// SqliteBoardStore - SQLite 实现
// ==========================================
pub struct SqliteBoardStore {
    config: ConfigManager,
    overrides: ScheduleOverrideRepository,
    notes: ReactorNoteRepository,
}

impl SqliteBoardStore {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 三个仓储共享同一连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let config = ConfigManager::from_connection(conn.clone()).map_err(config_error)?;
        let overrides = ScheduleOverrideRepository::from_connection(conn.clone())?;
        let notes = ReactorNoteRepository::from_connection(conn)?;
        Ok(Self {
            config,
            overrides,
            notes,
        })
    }
}

#[async_trait]
impl BoardStore for SqliteBoardStore {
    async fn load_board(&self, now: DateTime<Utc>) -> RepositoryResult<StoredBoard> {
        let initialized = self.config.has_settings().map_err(config_error)?;
        let settings = if initialized {
            self.config
                .load_board_settings(now)
                .await
                .map_err(config_error)?
        } else {
            BoardSettings::defaults(now)
        };

        let item_configs = self.overrides.list_all()?.into_iter().collect();
        let reactor_notes = self.notes.list_all()?;

        Ok(StoredBoard {
            settings,
            item_configs,
            reactor_notes,
            initialized,
        })
    }

    async fn save_settings(&self, settings: &BoardSettings) -> RepositoryResult<()> {
        self.config
            .save_board_settings(settings)
            .map_err(config_error)?;
        Ok(())
    }

    async fn save_base(&self, batch_number: i64, start_time: DateTime<Utc>) -> RepositoryResult<()> {
        self.config
            .save_base(batch_number, start_time)
            .map_err(config_error)
    }

    async fn upsert_override(&self, key: &ItemKey, config: &ItemConfig) -> RepositoryResult<()> {
        self.overrides.upsert(key, config)
    }

    async fn delete_override(&self, key: &ItemKey) -> RepositoryResult<usize> {
        self.overrides.delete(key)
    }

    async fn delete_overrides(&self, keys: &[ItemKey]) -> RepositoryResult<usize> {
        self.overrides.delete_many(keys)
    }

    async fn delete_all_overrides(&self) -> RepositoryResult<usize> {
        self.overrides.delete_all()
    }

    async fn upsert_reactor_note(&self, reactor_id: &str, note: &str) -> RepositoryResult<()> {
        self.notes.upsert(reactor_id, note)
    }
}

// ==========================================
// InMemoryBoardStore - 内存实现
// ==========================================
// 可通过 set_fail_writes 模拟存储不可用，所有写入返回 WriteRejected
#[derive(Debug, Default)]
struct InMemoryState {
    settings: Option<BoardSettings>,
    overrides: BTreeMap<ItemKey, ItemConfig>,
    notes: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct InMemoryBoardStore {
    state: Mutex<InMemoryState>,
    fail_writes: AtomicBool,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置设置单例
    pub fn with_settings(settings: BoardSettings) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.settings = Some(settings);
        }
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn settings(&self) -> Option<BoardSettings> {
        self.state.lock().ok().and_then(|s| s.settings.clone())
    }

    pub fn overrides(&self) -> BTreeMap<ItemKey, ItemConfig> {
        self.state
            .lock()
            .map(|s| s.overrides.clone())
            .unwrap_or_default()
    }

    pub fn notes(&self) -> BTreeMap<String, String> {
        self.state
            .lock()
            .map(|s| s.notes.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn writable(&self, operation: &str) -> RepositoryResult<std::sync::MutexGuard<'_, InMemoryState>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::WriteRejected(operation.to_string()));
        }
        self.lock()
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    async fn load_board(&self, now: DateTime<Utc>) -> RepositoryResult<StoredBoard> {
        let state = self.lock()?;
        Ok(StoredBoard {
            settings: state
                .settings
                .clone()
                .unwrap_or_else(|| BoardSettings::defaults(now)),
            item_configs: state.overrides.clone(),
            reactor_notes: state.notes.clone(),
            initialized: state.settings.is_some(),
        })
    }

    async fn save_settings(&self, settings: &BoardSettings) -> RepositoryResult<()> {
        let mut state = self.writable("save_settings")?;
        state.settings = Some(settings.clone());
        Ok(())
    }

    async fn save_base(&self, batch_number: i64, start_time: DateTime<Utc>) -> RepositoryResult<()> {
        let mut state = self.writable("save_base")?;
        let settings = state
            .settings
            .get_or_insert_with(|| BoardSettings::defaults(start_time));
        settings.base_batch_number = batch_number;
        settings.base_start_time = start_time;
        Ok(())
    }

    async fn upsert_override(&self, key: &ItemKey, config: &ItemConfig) -> RepositoryResult<()> {
        self.writable("upsert_override")?
            .overrides
            .insert(key.clone(), config.clone());
        Ok(())
    }

    async fn delete_override(&self, key: &ItemKey) -> RepositoryResult<usize> {
        let removed = self.writable("delete_override")?.overrides.remove(key);
        Ok(usize::from(removed.is_some()))
    }

    async fn delete_overrides(&self, keys: &[ItemKey]) -> RepositoryResult<usize> {
        let mut state = self.writable("delete_overrides")?;
        Ok(keys
            .iter()
            .filter(|key| state.overrides.remove(*key).is_some())
            .count())
    }

    async fn delete_all_overrides(&self) -> RepositoryResult<usize> {
        let mut state = self.writable("delete_all_overrides")?;
        let count = state.overrides.len();
        state.overrides.clear();
        Ok(count)
    }

    async fn upsert_reactor_note(&self, reactor_id: &str, note: &str) -> RepositoryResult<()> {
        self.writable("upsert_reactor_note")?
            .notes
            .insert(reactor_id.to_string(), note.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_sqlite_store_first_run_uses_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteBoardStore::from_connection(Arc::new(Mutex::new(conn))).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();

        let board = store.load_board(now).await.unwrap();
        assert!(!board.initialized);
        assert_eq!(board.settings, BoardSettings::defaults(now));
        assert!(board.item_configs.is_empty());
        assert!(board.reactor_notes.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_store_rejects_writes_when_failing() {
        let store = InMemoryBoardStore::new();
        let key = ItemKey::new("S", 1);
        store.upsert_override(&key, &ItemConfig::skipped()).await.unwrap();

        store.set_fail_writes(true);
        let err = store.delete_override(&key).await.unwrap_err();
        assert!(matches!(err, RepositoryError::WriteRejected(_)));
        assert_eq!(store.overrides().len(), 1);

        store.set_fail_writes(false);
        assert_eq!(store.delete_overrides(&[key.clone(), key]).await.unwrap(), 1);
    }
}
