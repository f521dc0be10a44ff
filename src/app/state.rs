// ==========================================
// 反应釜批次排程看板 - 应用状态
// ==========================================
// 职责: 打开数据库、加载看板会话，作为运行时共享状态
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::api::ScheduleBoardApi;
use crate::engine::{LoggingEventPublisher, OptionalEventPublisher, RecurrenceGenerator};
use crate::repository::{BoardStore, SqliteBoardStore};

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 看板会话（运行时与操作入口共享）
    pub board: Arc<Mutex<ScheduleBoardApi>>,
}

impl AppState {
    /// 打开 SQLite 存储并加载看板
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let store = SqliteBoardStore::new(&db_path)
            .map_err(|e| format!("无法打开看板存储: {}", e))?;
        Self::with_store(db_path, Arc::new(store)).await
    }

    /// 使用指定存储加载看板
    pub async fn with_store(db_path: String, store: Arc<dyn BoardStore>) -> Result<Self, String> {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(LoggingEventPublisher));
        let board = ScheduleBoardApi::load(store, RecurrenceGenerator::default(), publisher, Utc::now())
            .await
            .map_err(|e| format!("无法加载看板: {}", e))?;

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            board: Arc::new(Mutex::new(board)),
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 REACTOR_SCHEDULE_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("REACTOR_SCHEDULE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./reactor_schedule.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("reactor-schedule-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("reactor-schedule");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("reactor_schedule.db");
    }

    path.to_string_lossy().to_string()
}
