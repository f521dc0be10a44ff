// ==========================================
// ScheduleBoardApi 集成测试
// ==========================================
// 测试目标: 操作员编辑（改期/重置/备注/提醒）与 SQLite 存储镜像
// ==========================================


use std::sync::Arc;

use chrono::Duration;
use reactor_schedule::api::ScheduleBoardApi;
use reactor_schedule::config::{config_keys, ConfigManager};
use reactor_schedule::domain::ItemKey;
use reactor_schedule::engine::{
    suggested_reset_time, AdvanceState, BoardEvent, OptionalEventPublisher, RecurrenceGenerator,
};
use reactor_schedule::repository::{BoardStore, SqliteBoardStore};
use reactor_schedule::{Grade, ItemMode, ItemStatus};
use test_helpers::{at, base_time, create_test_db, insert_test_config};

async fn load_board(db_path: &str) -> ScheduleBoardApi {
    let store: Arc<dyn BoardStore> = Arc::new(SqliteBoardStore::new(db_path).unwrap());
    ScheduleBoardApi::load(
        store,
        RecurrenceGenerator::default(),
        OptionalEventPublisher::none(),
        at(5, 0),
    )
    .await
    .unwrap()
}

fn seeded_db() -> (tempfile::NamedTempFile, String) {
    let (temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");
    (temp_file, db_path)
}

#[tokio::test]
async fn test_reschedule_form_flow_persists() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;
    let key = ItemKey::new("T", 5165);

    let mut draft = board.draft_for(&key, at(5, 0)).unwrap();
    assert_eq!(draft.time, at(7, 30));
    assert_eq!(draft.mode, ItemMode::Close);

    draft.change_mode(ItemMode::Open);
    assert_eq!(draft.time, at(7, 0));
    assert!(draft.apply_manual_delay(0, 20));
    draft.grade = Grade::Slk;
    draft.shift_subsequent = true;
    board.save_reschedule(key.clone(), draft).await.unwrap();

    let snapshot = board.snapshot(at(5, 0));
    let t = snapshot.matrix.find(&key).unwrap();
    assert_eq!(t.start_time, at(7, 20));
    assert_eq!(t.delta_minutes, -10);
    assert_eq!(t.grade, Grade::Slk);
    assert_eq!(t.mode(), ItemMode::Open);

    // 后续整体提前 10 分钟
    let u = snapshot.matrix.find(&ItemKey::new("U", 5166)).unwrap();
    assert_eq!(u.start_time, at(8, 50));

    // 重新打开后状态一致
    let reopened = load_board(&db_path).await;
    let reloaded = reopened.config().item_config(&key).unwrap();
    assert_eq!(reloaded.override_time, Some(at(7, 20)));
    assert_eq!(reloaded.manual_delay_minutes, Some(20));
    assert_eq!(reloaded.grade, Some(Grade::Slk));
    assert_eq!(reopened.snapshot(at(5, 0)), snapshot);
}

#[tokio::test]
async fn test_grade_equal_to_board_grade_is_not_stored() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;
    let key = ItemKey::new("S", 5164);

    let draft = board.draft_for(&key, at(5, 0)).unwrap();
    board.save_reschedule(key.clone(), draft).await.unwrap();
    assert_eq!(board.config().item_config(&key).unwrap().grade, None);

    // 看板牌号变化时，未单独指定牌号的格跟随
    board.set_current_grade(Grade::Se).await;
    let snapshot = board.snapshot(at(5, 0));
    assert_eq!(snapshot.matrix.find(&key).unwrap().grade, Grade::Se);
}

#[tokio::test]
async fn test_reset_sequence_clears_overrides() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;
    board
        .clear_override(&ItemKey::new("S", 1))
        .await;
    let draft = board.draft_for(&ItemKey::new("V", 5167), at(5, 0)).unwrap();
    board
        .save_reschedule(ItemKey::new("V", 5167), draft)
        .await
        .unwrap();

    let now = at(16, 3);
    let reset_time = suggested_reset_time(now);
    assert_eq!(reset_time, at(16, 5));
    board.reset_sequence(6000, reset_time).await.unwrap();

    assert!(board.config().item_configs.is_empty());
    assert_eq!(board.advance_state(), AdvanceState::Idle);
    let snapshot = board.snapshot(now);
    assert_eq!(snapshot.matrix.flat()[0].key, ItemKey::new("S", 6000));
    assert_eq!(snapshot.matrix.flat()[0].start_time, at(16, 5));

    let reopened = load_board(&db_path).await;
    assert_eq!(reopened.config().base_batch_number, 6000);
    assert!(reopened.config().item_configs.is_empty());
}

#[tokio::test]
async fn test_alert_and_dismissal() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;

    // T 在 07:30 开始，07:29:30 时进入 60 秒提醒窗口
    let now = at(7, 29) + Duration::seconds(30);
    let alert = board.snapshot(now).alert.unwrap();
    assert_eq!(alert.key, ItemKey::new("T", 5165));

    board.dismiss_alert(alert.key.clone());
    assert!(board.snapshot(now).alert.is_none());

    board.set_alert_threshold(0).await;
    board.set_alert_threshold(60).await;
    assert!(board.snapshot(now).alert.is_none());
}

#[tokio::test]
async fn test_batch_started_announced_once() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;

    let first = board.tick(base_time()).await;
    assert_eq!(
        first.events,
        vec![BoardEvent::BatchStarted {
            key: ItemKey::new("S", 5164),
            start_time: base_time(),
        }]
    );
    assert_eq!(first.snapshot.matrix.flat()[0].status, ItemStatus::Active);

    let second = board.tick(base_time() + Duration::seconds(30)).await;
    assert!(second.events.is_empty());
}

#[tokio::test]
async fn test_stopped_board_does_not_announce() {
    let (_temp_file, db_path) = seeded_db();
    ConfigManager::new(&db_path)
        .unwrap()
        .set_config_value(config_keys::IS_STOPPED, "true")
        .unwrap();

    let store: Arc<dyn BoardStore> = Arc::new(SqliteBoardStore::new(&db_path).unwrap());
    let mut board = ScheduleBoardApi::load(
        store,
        RecurrenceGenerator::default(),
        OptionalEventPublisher::none(),
        base_time(),
    )
    .await
    .unwrap();
    assert!(board.is_stopped());

    // 看板时钟冻结在 06:00，S-5164 处于 active
    let stopped = board.tick(base_time() + Duration::seconds(5)).await;
    assert_eq!(stopped.snapshot.matrix.flat()[0].status, ItemStatus::Active);
    assert!(!stopped
        .events
        .iter()
        .any(|e| matches!(e, BoardEvent::BatchStarted { .. })));

    // 恢复运行后才播报
    let resumed_at = base_time() + Duration::seconds(10);
    board.set_stopped(false, resumed_at).await;
    let running = board.tick(resumed_at).await;
    assert_eq!(
        running.events,
        vec![BoardEvent::BatchStarted {
            key: ItemKey::new("S", 5164),
            start_time: base_time(),
        }]
    );
}

#[tokio::test]
async fn test_reactor_note_validation_and_persistence() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;

    assert!(board.save_reactor_note("X", "nope").await.is_err());
    board.save_reactor_note("U", "check agitator").await.unwrap();

    let reopened = load_board(&db_path).await;
    assert_eq!(
        reopened.reactor_notes().get("U").map(String::as_str),
        Some("check agitator")
    );
    assert_eq!(
        reopened.snapshot(at(5, 0)).reactor_notes.len(),
        1
    );
}

#[tokio::test]
async fn test_columns_change_reflects_in_matrix() {
    let (_temp_file, db_path) = seeded_db();
    let mut board = load_board(&db_path).await;

    assert_eq!(board.snapshot(at(5, 0)).matrix.len(), 20);
    board.set_columns(2).await.unwrap();
    assert_eq!(board.snapshot(at(5, 0)).matrix.len(), 10);

    let reopened = load_board(&db_path).await;
    assert_eq!(reopened.config().columns_to_display, 2);
}
