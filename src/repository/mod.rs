// ==========================================
// 反应釜批次排程看板 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod board_store;
pub mod error;
pub mod override_repo;
pub mod reactor_note_repo;

// 重导出核心仓储
pub use board_store::{BoardStore, InMemoryBoardStore, SqliteBoardStore, StoredBoard};
pub use error::{RepositoryError, RepositoryResult};
pub use override_repo::ScheduleOverrideRepository;
pub use reactor_note_repo::ReactorNoteRepository;
