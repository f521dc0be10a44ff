// ==========================================
// 反应釜批次排程看板 - 应用层
// ==========================================
// 职责: 组装存储与看板会话，驱动每秒重算循环
// ==========================================

pub mod runtime;
pub mod state;

// 重导出
pub use runtime::{run_board, RuntimeStats, DEFAULT_TICK_PERIOD};
pub use state::{get_default_db_path, AppState};
