// ==========================================
// 反应釜批次排程看板 - 主入口
// ==========================================
// 用法:
// - reactor-schedule            运行看板循环（Ctrl+C 退出）
// - reactor-schedule snapshot   输出当前看板快照 (JSON) 后退出
// ==========================================

use chrono::Utc;
use reactor_schedule::app::{get_default_db_path, run_board, AppState, DEFAULT_TICK_PERIOD};
use reactor_schedule::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", reactor_schedule::APP_NAME);
    tracing::info!("系统版本: {}", reactor_schedule::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path)
        .await
        .map_err(anyhow::Error::msg)?;

    if std::env::args().nth(1).as_deref() == Some("snapshot") {
        let snapshot = app_state.board.lock().await.snapshot(Utc::now());
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("无法监听退出信号: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let stats = run_board(app_state.board.clone(), DEFAULT_TICK_PERIOD, shutdown).await;
    tracing::info!(ticks = stats.ticks, advances = stats.advances, "看板已退出");
    Ok(())
}
