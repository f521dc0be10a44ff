// ==========================================
// 反应釜批次排程看板 - 看板会话 API
// ==========================================
// 职责: 持有内存中的排程配置，驱动每秒重算与自动推进，处理操作员编辑
// 约定: 所有变更先改内存再镜像到存储；存储失败只记录日志，不回滚内存
// ==========================================

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{BoardSettings, MAX_COLUMNS_TO_DISPLAY, MIN_COLUMNS_TO_DISPLAY};
use crate::domain::schedule::{
    AdvanceParams, ItemConfig, ItemKey, ScheduleConfig, ScheduleGeneration, ScheduleItem,
    ScheduleMatrix,
};
use crate::domain::types::Grade;
use crate::engine::{
    apply_advance, impending_alert, is_schedule_complete, AdvanceState, AnnouncementTracker,
    AutoAdvanceController, BoardEvent, ControllerTransition, OptionalEventPublisher,
    OverrideDraft, RecurrenceGenerator,
};
use crate::repository::{BoardStore, RepositoryResult};

// ==========================================
// 返回结构
// ==========================================

/// 看板快照（单轮重算结果）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    /// 看板时钟（停机时冻结）
    pub board_time: DateTime<Utc>,
    pub matrix: ScheduleMatrix,
    pub next_advance: AdvanceParams,
    pub is_complete: bool,
    pub is_stopped: bool,
    pub advance_state: AdvanceState,
    /// 需要全屏提醒的排程格
    pub alert: Option<ScheduleItem>,
    pub reactor_notes: BTreeMap<String, String>,
}

/// 单次 tick 结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutcome {
    pub snapshot: BoardSnapshot,
    pub events: Vec<BoardEvent>,
}

// ==========================================
// ScheduleBoardApi - 看板会话 API
// ==========================================
pub struct ScheduleBoardApi {
    generator: RecurrenceGenerator,
    config: ScheduleConfig,
    reactor_notes: BTreeMap<String, String>,
    /// 停机时冻结的看板时钟
    frozen_at: Option<DateTime<Utc>>,
    controller: AutoAdvanceController,
    tracker: AnnouncementTracker,
    dismissed: HashSet<ItemKey>,
    /// 上一轮是否已处于完成状态（SequenceCompleted 只在进入完成时发布一次）
    completion_seen: bool,
    store: Arc<dyn BoardStore>,
    publisher: OptionalEventPublisher,
}

impl ScheduleBoardApi {
    /// 从存储加载看板
    ///
    /// # 说明
    /// - 首次启动写入默认设置（基准时间 = now）
    /// - 以停机状态加载时，看板时钟冻结在 now
    pub async fn load(
        store: Arc<dyn BoardStore>,
        generator: RecurrenceGenerator,
        publisher: OptionalEventPublisher,
        now: DateTime<Utc>,
    ) -> ApiResult<Self> {
        let stored = store.load_board(now).await?;

        if !stored.initialized {
            tracing::info!("未找到看板设置，写入默认设置");
            log_store_error("save_settings", store.save_settings(&stored.settings).await);
        }

        let frozen_at = stored.settings.is_stopped.then_some(now);
        let config = stored.settings.into_schedule_config(stored.item_configs);

        tracing::info!(
            base_batch_number = config.base_batch_number,
            base_start_time = %config.base_start_time,
            overrides = config.item_configs.len(),
            is_stopped = config.is_stopped,
            "看板加载完成"
        );

        Ok(Self {
            generator,
            config,
            reactor_notes: stored.reactor_notes,
            frozen_at,
            controller: AutoAdvanceController::new(),
            tracker: AnnouncementTracker::new(),
            dismissed: HashSet::new(),
            completion_seen: false,
            store,
            publisher,
        })
    }

    /// 替换自动推进控制器（测试中缩短结算延迟）
    pub fn with_controller(mut self, controller: AutoAdvanceController) -> Self {
        self.controller = controller;
        self
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn reactor_notes(&self) -> &BTreeMap<String, String> {
        &self.reactor_notes
    }

    pub fn advance_state(&self) -> AdvanceState {
        self.controller.state()
    }

    /// 自动推进截止时刻（供运行时调度定时器）
    pub fn advance_deadline(&self) -> Option<DateTime<Utc>> {
        self.controller.deadline()
    }

    pub fn is_stopped(&self) -> bool {
        self.config.is_stopped
    }

    /// 看板时钟：停机时返回冻结时刻
    pub fn board_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.frozen_at.unwrap_or(now)
    }

    /// 按当前配置生成一轮排程
    pub fn generate(&self, now: DateTime<Utc>) -> ScheduleGeneration {
        self.generator.generate(&self.config, self.board_time(now))
    }

    /// 只读快照（不推进状态机）
    pub fn snapshot(&self, now: DateTime<Utc>) -> BoardSnapshot {
        let board_time = self.board_time(now);
        let generation = self.generator.generate(&self.config, board_time);
        self.build_snapshot(board_time, generation)
    }

    fn build_snapshot(&self, board_time: DateTime<Utc>, generation: ScheduleGeneration) -> BoardSnapshot {
        let alert = impending_alert(
            &generation.matrix,
            board_time,
            self.config.alert_threshold_seconds,
            self.config.is_stopped,
            &self.dismissed,
        )
        .cloned();

        BoardSnapshot {
            board_time,
            is_complete: is_schedule_complete(&generation.matrix),
            is_stopped: self.config.is_stopped,
            advance_state: self.controller.state(),
            alert,
            reactor_notes: self.reactor_notes.clone(),
            matrix: generation.matrix,
            next_advance: generation.next_advance,
        }
    }

    // ==========================================
    // 每秒重算
    // ==========================================

    /// 重算一轮并推进自动推进状态机
    ///
    /// # 流程
    /// 1. 以看板时钟生成矩阵
    /// 2. 运行中新进入 active 的排程格发布 BatchStarted
    /// 3. 完成判定驱动控制器；到期时以本轮矩阵的推进参数提交
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let board_time = self.board_time(now);
        let generation = self.generator.generate(&self.config, board_time);
        let is_complete = is_schedule_complete(&generation.matrix);
        let mut events = Vec::new();

        // 停机时不播报
        if !self.config.is_stopped {
            for item in self.tracker.collect_new(&generation.matrix) {
                events.push(BoardEvent::BatchStarted {
                    key: item.key.clone(),
                    start_time: item.start_time,
                });
            }
        }

        if is_complete && !self.completion_seen {
            events.push(BoardEvent::SequenceCompleted {
                next_batch: generation.next_advance.batch,
            });
        }
        self.completion_seen = is_complete;

        let committed = match self
            .controller
            .observe(is_complete, self.config.is_stopped, board_time)
        {
            ControllerTransition::Unchanged => false,
            ControllerTransition::Armed { due_at } => {
                events.push(BoardEvent::AdvanceArmed { due_at });
                false
            }
            ControllerTransition::Cancelled => {
                events.push(BoardEvent::AdvanceCancelled);
                false
            }
            ControllerTransition::ReadyToCommit => {
                let params = generation.next_advance;
                let removed = self.commit_advance(params).await;
                events.push(BoardEvent::committed(params, removed));
                true
            }
        };

        for event in &events {
            self.publisher.publish(event);
        }

        let snapshot = if committed {
            self.snapshot(now)
        } else {
            self.build_snapshot(board_time, generation)
        };
        TickOutcome { snapshot, events }
    }

    /// 提交自动推进
    ///
    /// # 返回
    /// - 回收的覆写数量
    async fn commit_advance(&mut self, params: AdvanceParams) -> usize {
        let removed = apply_advance(&mut self.config, params);
        self.tracker.clear();
        self.dismissed.clear();
        self.completion_seen = false;
        self.controller.finish_commit();

        tracing::info!(
            batch = params.batch,
            time = %params.time,
            removed_overrides = removed.len(),
            "自动推进已提交"
        );

        log_store_error("save_base", self.store.save_base(params.batch, params.time).await);
        if !removed.is_empty() {
            log_store_error("delete_overrides", self.store.delete_overrides(&removed).await);
        }
        removed.len()
    }

    // ==========================================
    // 设置变更
    // ==========================================

    /// 设置基准批号与开始时间（批号不得为负）
    pub async fn set_base(
        &mut self,
        batch_number: i64,
        start_time: DateTime<Utc>,
    ) -> ApiResult<()> {
        ensure_batch_number(batch_number)?;
        self.config.base_batch_number = batch_number;
        self.config.base_start_time = start_time;
        log_store_error("save_base", self.store.save_base(batch_number, start_time).await);
        Ok(())
    }

    /// 设置间隔（小时 0-23，分钟 0-59）
    pub async fn set_interval(&mut self, hours: u32, minutes: u32) -> ApiResult<()> {
        if hours > 23 || minutes > 59 {
            return Err(ApiError::InvalidInput(format!(
                "间隔超出范围: {}h {}m（小时 0-23，分钟 0-59）",
                hours, minutes
            )));
        }
        self.config.interval_hours = hours;
        self.config.interval_minutes = minutes;
        self.persist_settings().await;
        Ok(())
    }

    /// 设置显示周期数（1-10）
    pub async fn set_columns(&mut self, columns: u32) -> ApiResult<()> {
        if !(MIN_COLUMNS_TO_DISPLAY..=MAX_COLUMNS_TO_DISPLAY).contains(&columns) {
            return Err(ApiError::InvalidInput(format!(
                "显示周期数超出范围: {}（允许 {}-{}）",
                columns, MIN_COLUMNS_TO_DISPLAY, MAX_COLUMNS_TO_DISPLAY
            )));
        }
        self.config.columns_to_display = columns;
        self.persist_settings().await;
        Ok(())
    }

    pub async fn set_current_grade(&mut self, grade: Grade) {
        self.config.current_grade = grade;
        self.persist_settings().await;
    }

    pub async fn set_alert_threshold(&mut self, seconds: u32) {
        self.config.alert_threshold_seconds = seconds;
        self.persist_settings().await;
    }

    /// 停机/恢复
    ///
    /// 停机时看板时钟冻结在 now，并立即取消待触发的自动推进；恢复后时钟继续走
    pub async fn set_stopped(&mut self, stopped: bool, now: DateTime<Utc>) {
        if self.config.is_stopped == stopped {
            return;
        }
        self.config.is_stopped = stopped;
        if stopped {
            self.frozen_at = Some(now);
            if self.controller.cancel() {
                self.publisher.publish(&BoardEvent::AdvanceCancelled);
            }
        } else {
            self.frozen_at = None;
        }
        tracing::info!(stopped, "看板停机状态变更");
        self.persist_settings().await;
    }

    async fn persist_settings(&self) {
        let settings = BoardSettings::from_schedule_config(&self.config);
        log_store_error("save_settings", self.store.save_settings(&settings).await);
    }

    // ==========================================
    // 单批次覆写
    // ==========================================

    /// 写入单批次覆写（整条替换）
    pub async fn upsert_override(&mut self, key: ItemKey, config: ItemConfig) -> ApiResult<()> {
        self.ensure_reactor(&key.reactor_id)?;
        self.config.item_configs.insert(key.clone(), config.clone());
        log_store_error("upsert_override", self.store.upsert_override(&key, &config).await);
        Ok(())
    }

    /// 清除单批次覆写
    ///
    /// # 返回
    /// - true: 内存中确实存在并已删除
    pub async fn clear_override(&mut self, key: &ItemKey) -> bool {
        let removed = self.config.item_configs.remove(key).is_some();
        log_store_error("delete_override", self.store.delete_override(key).await);
        removed
    }

    /// 为可见排程格构建改期草稿
    pub fn draft_for(&self, key: &ItemKey, now: DateTime<Utc>) -> ApiResult<OverrideDraft> {
        let generation = self.generate(now);
        generation
            .matrix
            .find(key)
            .map(OverrideDraft::from_item)
            .ok_or_else(|| ApiError::NotFound(format!("排程格(id={})不在当前窗口内", key)))
    }

    /// 保存改期表单
    pub async fn save_reschedule(&mut self, key: ItemKey, draft: OverrideDraft) -> ApiResult<()> {
        let config = draft.into_item_config(self.config.current_grade);
        self.dismissed.remove(&key);
        tracing::debug!(item = %key, "保存改期");
        self.upsert_override(key, config).await
    }

    /// 重置序列：设置新基准并清空全部覆写
    pub async fn reset_sequence(
        &mut self,
        batch_number: i64,
        start_time: DateTime<Utc>,
    ) -> ApiResult<()> {
        ensure_batch_number(batch_number)?;
        self.config.base_batch_number = batch_number;
        self.config.base_start_time = start_time;
        let cleared = self.config.item_configs.len();
        self.config.item_configs.clear();
        self.dismissed.clear();
        self.tracker.clear();
        self.completion_seen = false;
        if self.controller.cancel() {
            self.publisher.publish(&BoardEvent::AdvanceCancelled);
        }

        tracing::info!(batch_number, %start_time, cleared, "序列已重置");

        log_store_error("save_base", self.store.save_base(batch_number, start_time).await);
        log_store_error("delete_all_overrides", self.store.delete_all_overrides().await);
        Ok(())
    }

    // ==========================================
    // 反应釜备注 / 提醒
    // ==========================================

    pub async fn save_reactor_note(&mut self, reactor_id: &str, note: &str) -> ApiResult<()> {
        self.ensure_reactor(reactor_id)?;
        self.reactor_notes
            .insert(reactor_id.to_string(), note.to_string());
        log_store_error(
            "upsert_reactor_note",
            self.store.upsert_reactor_note(reactor_id, note).await,
        );
        Ok(())
    }

    /// 关闭某排程格的全屏提醒（直到下次推进或重置）
    pub fn dismiss_alert(&mut self, key: ItemKey) {
        self.dismissed.insert(key);
    }

    fn ensure_reactor(&self, reactor_id: &str) -> ApiResult<()> {
        if self.generator.reactors().contains(reactor_id) {
            Ok(())
        } else {
            Err(ApiError::InvalidInput(format!("未知反应釜: {}", reactor_id)))
        }
    }
}

fn ensure_batch_number(batch_number: i64) -> ApiResult<()> {
    if batch_number < 0 {
        return Err(ApiError::InvalidInput(format!(
            "批号不能为负: {}",
            batch_number
        )));
    }
    Ok(())
}

/// 存储镜像失败只记录日志
fn log_store_error<T>(operation: &str, result: RepositoryResult<T>) {
    if let Err(e) = result {
        tracing::error!(operation, error = %e, "看板状态写入存储失败，内存状态保留");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryBoardStore;
    use chrono::{Duration, TimeZone};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    async fn board(store: Arc<InMemoryBoardStore>) -> ScheduleBoardApi {
        let mut settings = BoardSettings::defaults(t(6, 0));
        settings.base_batch_number = 5164;
        settings.columns_to_display = 1;
        store.save_settings(&settings).await.unwrap();
        ScheduleBoardApi::load(
            store,
            RecurrenceGenerator::default(),
            OptionalEventPublisher::none(),
            t(5, 0),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_load_writes_defaults() {
        let store = Arc::new(InMemoryBoardStore::new());
        let api = ScheduleBoardApi::load(
            store.clone(),
            RecurrenceGenerator::default(),
            OptionalEventPublisher::none(),
            t(6, 0),
        )
        .await
        .unwrap();

        assert_eq!(api.config().base_start_time, t(6, 0));
        assert_eq!(store.settings(), Some(BoardSettings::defaults(t(6, 0))));
    }

    #[tokio::test]
    async fn test_unknown_reactor_is_rejected() {
        let store = Arc::new(InMemoryBoardStore::new());
        let mut api = board(store).await;
        let err = api
            .upsert_override(ItemKey::new("Z", 5164), ItemConfig::skipped())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_memory_state() {
        let store = Arc::new(InMemoryBoardStore::new());
        let mut api = board(store.clone()).await;
        store.set_fail_writes(true);

        let key = ItemKey::new("T", 5165);
        api.upsert_override(key.clone(), ItemConfig::skipped())
            .await
            .unwrap();
        assert!(api.config().item_config(&key).is_some());
        assert!(store.overrides().is_empty());
    }

    #[tokio::test]
    async fn test_stop_freezes_board_clock() {
        let store = Arc::new(InMemoryBoardStore::new());
        let mut api = board(store).await;

        api.set_stopped(true, t(6, 30)).await;
        assert_eq!(api.board_time(t(9, 0)), t(6, 30));
        let snapshot = api.snapshot(t(9, 0));
        assert!(snapshot.is_stopped);
        assert!(snapshot.alert.is_none());

        api.set_stopped(false, t(9, 0)).await;
        assert_eq!(api.board_time(t(9, 1)), t(9, 1));
    }

    #[tokio::test]
    async fn test_draft_for_visible_item() {
        let store = Arc::new(InMemoryBoardStore::new());
        let api = board(store).await;

        let draft = api.draft_for(&ItemKey::new("U", 5166), t(5, 0)).unwrap();
        assert_eq!(draft.time, t(9, 0));
        assert!(api
            .draft_for(&ItemKey::new("U", 9999), t(5, 0))
            .is_err());
    }

    #[tokio::test]
    async fn test_interval_validation() {
        let store = Arc::new(InMemoryBoardStore::new());
        let mut api = board(store.clone()).await;

        assert!(api.set_interval(24, 0).await.is_err());
        assert!(api.set_columns(0).await.is_err());
        api.set_interval(0, 45).await.unwrap();
        assert_eq!(api.config().interval(), Duration::minutes(45));
        assert_eq!(store.settings().map(|s| s.interval_minutes), Some(45));
    }

    #[tokio::test]
    async fn test_negative_batch_number_is_rejected() {
        let store = Arc::new(InMemoryBoardStore::new());
        let mut api = board(store.clone()).await;

        let err = api.set_base(-5, t(7, 0)).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        let err = api.reset_sequence(-1, t(7, 0)).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        assert_eq!(api.config().base_batch_number, 5164);
        assert_eq!(store.settings().map(|s| s.base_batch_number), Some(5164));

        api.set_base(0, t(7, 0)).await.unwrap();
        assert_eq!(api.config().base_batch_number, 0);
    }
}
