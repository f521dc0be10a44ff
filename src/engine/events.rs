// ==========================================
// 反应釜批次排程看板 - 看板事件发布
// ==========================================
// 职责: 定义看板事件发布 trait，实现依赖倒置
// 说明: 引擎层定义 trait，展示层（声音/语音/横幅）实现适配器
// ==========================================

use crate::domain::schedule::{AdvanceParams, ItemKey};
use crate::engine::alert::{format_date, format_time};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 看板事件类型
// ==========================================

/// 看板事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoardEvent {
    /// 批次进入 active（开始播报）
    BatchStarted {
        key: ItemKey,
        start_time: DateTime<Utc>,
    },
    /// 可见窗口全部结束
    SequenceCompleted { next_batch: i64 },
    /// 自动推进计时启动
    AdvanceArmed { due_at: DateTime<Utc> },
    /// 自动推进计时取消
    AdvanceCancelled,
    /// 自动推进已提交
    AdvanceCommitted {
        batch: i64,
        time: DateTime<Utc>,
        removed_overrides: usize,
    },
}

impl BoardEvent {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            BoardEvent::BatchStarted { .. } => "BatchStarted",
            BoardEvent::SequenceCompleted { .. } => "SequenceCompleted",
            BoardEvent::AdvanceArmed { .. } => "AdvanceArmed",
            BoardEvent::AdvanceCancelled => "AdvanceCancelled",
            BoardEvent::AdvanceCommitted { .. } => "AdvanceCommitted",
        }
    }

    pub fn committed(params: AdvanceParams, removed_overrides: usize) -> Self {
        BoardEvent::AdvanceCommitted {
            batch: params.batch,
            time: params.time,
            removed_overrides,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 看板事件发布者 Trait
pub trait BoardEventPublisher: Send + Sync {
    /// 发布看板事件
    fn publish(&self, event: &BoardEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl BoardEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: &BoardEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!("NoOpEventPublisher: 跳过事件发布 - event={}", event.as_str());
        Ok(())
    }
}

/// 日志事件发布者（无界面运行时使用）
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher;

impl BoardEventPublisher for LoggingEventPublisher {
    fn publish(&self, event: &BoardEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        match event {
            BoardEvent::BatchStarted { key, start_time } => {
                tracing::info!(item = %key, start = %format_time(*start_time), "批次开始");
            }
            BoardEvent::SequenceCompleted { next_batch } => {
                tracing::info!(next_batch, "本轮排程全部结束");
            }
            BoardEvent::AdvanceArmed { due_at } => {
                tracing::info!(%due_at, "自动推进计时启动");
            }
            BoardEvent::AdvanceCancelled => {
                tracing::info!("自动推进计时取消");
            }
            BoardEvent::AdvanceCommitted {
                batch,
                time,
                removed_overrides,
            } => {
                tracing::info!(
                    batch,
                    start = %format!("{} {}", format_date(*time), format_time(*time)),
                    removed_overrides,
                    "自动推进已提交"
                );
            }
        }
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn BoardEventPublisher>> 的使用
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn BoardEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn BoardEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者），失败只记录日志
    pub fn publish(&self, event: &BoardEvent) {
        match &self.inner {
            Some(publisher) => {
                if let Err(e) = publisher.publish(event) {
                    tracing::warn!("发布看板事件失败: event={}, error={}", event.as_str(), e);
                }
            }
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event={}",
                    event.as_str()
                );
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        seen: Mutex<Vec<String>>,
    }

    impl BoardEventPublisher for RecordingPublisher {
        fn publish(&self, event: &BoardEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().push(event.as_str().to_string());
            Ok(())
        }
    }

    struct FailingPublisher;

    impl BoardEventPublisher for FailingPublisher {
        fn publish(&self, _event: &BoardEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("sink closed".into())
        }
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = NoOpEventPublisher;
        assert!(publisher.publish(&BoardEvent::AdvanceCancelled).is_ok());
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        publisher.publish(&BoardEvent::AdvanceCancelled);
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recorder = Arc::new(RecordingPublisher::default());
        let publisher = OptionalEventPublisher::with_publisher(recorder.clone());
        assert!(publisher.is_configured());

        publisher.publish(&BoardEvent::SequenceCompleted { next_batch: 5169 });
        assert_eq!(
            recorder.seen.lock().unwrap().as_slice(),
            &["SequenceCompleted".to_string()]
        );
    }

    #[test]
    fn test_optional_publisher_swallows_errors() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(FailingPublisher));
        publisher.publish(&BoardEvent::AdvanceCancelled);
    }

    #[test]
    fn test_logging_publisher_accepts_all_events() {
        let publisher = LoggingEventPublisher;
        let t = chrono::Utc::now();
        let events = vec![
            BoardEvent::BatchStarted {
                key: ItemKey::new("S", 1),
                start_time: t,
            },
            BoardEvent::SequenceCompleted { next_batch: 2 },
            BoardEvent::AdvanceArmed { due_at: t },
            BoardEvent::AdvanceCancelled,
            BoardEvent::committed(AdvanceParams { batch: 2, time: t }, 0),
        ];
        for event in &events {
            assert!(publisher.publish(event).is_ok());
        }
    }
}
