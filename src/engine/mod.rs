// ==========================================
// 反应釜批次排程看板 - 引擎层
// ==========================================
// 职责: 排程递推、状态判定、完成判定、自动推进
// 红线: Engine 不拼 SQL；除自动推进外全部为纯推导
// ==========================================

pub mod advance;
pub mod alert;
pub mod completion;
pub mod events;
pub mod overrides;
pub mod recurrence;
pub mod status;

// 重导出核心引擎
pub use advance::{
    apply_advance, AdvanceState, AutoAdvanceController, ControllerTransition,
    SETTLING_DELAY_SECONDS,
};
pub use alert::{delay_label, format_date, format_time, impending_alert, AnnouncementTracker};
pub use completion::is_schedule_complete;
pub use events::{
    BoardEvent, BoardEventPublisher, LoggingEventPublisher, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use overrides::{suggested_reset_time, OverrideDraft};
pub use recurrence::{delta_minutes, RecurrenceGenerator, Slot, SlotCursor};
pub use status::classify_status;
