use std::sync::Arc;

use async_trait::async_trait;
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use engine::{
    logger, BootstrapHandle, DecisionSnapshot, EngineConfig, LifecycleHub,
    LifecycleRefreshCoordinator, LifecycleState, Navigator, QuoteFeedScheduler, RefreshAction,
    SessionStore, SystemClock, TimedEntrance,
};
use feeds::HttpTickerFeed;
use interface::{QuoteBoard, RefreshError, RoutingDecision, SessionSnapshot, SessionUser};

#[derive(Debug, StructOpt)]
#[structopt(name = "bullion", about = "실시간 시세 동기화 / 세션 부트스트랩 콘솔")]
enum Command {
    /// 시세 피드를 폴링하며 시세판을 출력
    Quotes {
        /// QUOTE_FEED_URL 대신 사용할 피드 주소
        #[structopt(long)]
        url: Option<String>,
        /// QUOTE_POLL_INTERVAL_MS 대신 사용할 폴링 주기 (ms)
        #[structopt(long)]
        interval_ms: Option<u64>,
        /// 시세판을 JSON 한 줄로 출력
        #[structopt(long)]
        json: bool,
    },
    /// 스크립트된 세션 스토어로 부트스트랩 라우팅 실행
    Bootstrap {
        /// 초기화 완료 후 사용자 role
        #[structopt(long)]
        role: Option<String>,
        /// 온보딩을 이미 본 사용자
        #[structopt(long)]
        seen_onboarding: bool,
        /// 세션 스토어 초기화에 걸리는 시간 (ms)
        #[structopt(long, default_value = "300")]
        init_delay_ms: u64,
        /// 결정에 사용할 스냅샷: latest | trigger
        #[structopt(long)]
        decision: Option<DecisionSnapshot>,
    },
    /// 알림 갱신 코디네이터 실행. stdin 으로 bg / fg / inactive / logout / login 입력
    Notifications,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    dotenv::dotenv().ok();

    // init logging
    let _guards = logger::init_tracing("logs", "bullion")?;

    let config = EngineConfig::from_env()?;
    let cmd = Command::from_args();

    match cmd {
        Command::Quotes {
            url,
            interval_ms,
            json,
        } => run_quotes(config, url, interval_ms, json).await,
        Command::Bootstrap {
            role,
            seen_onboarding,
            init_delay_ms,
            decision,
        } => run_bootstrap(config, role, seen_onboarding, init_delay_ms, decision).await,
        Command::Notifications => run_notifications(config).await,
    }
}

async fn run_quotes(
    mut config: EngineConfig,
    url: Option<String>,
    interval_ms: Option<u64>,
    json: bool,
) -> eyre::Result<()> {
    if let Some(url) = url {
        config.feed.url = url;
    }
    if let Some(ms) = interval_ms.filter(|ms| *ms > 0) {
        config.feed.poll_interval = std::time::Duration::from_millis(ms);
    }

    let feed = Arc::new(HttpTickerFeed::new(config.feed.url.clone(), config.feed.timeout)?);
    let scheduler = QuoteFeedScheduler::start(feed, &config.feed, Arc::new(SystemClock));
    let mut rx = scheduler.subscribe();
    let mut shown_seq = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let board = rx.borrow_and_update().clone();
                if board.applied_seq != shown_seq {
                    shown_seq = board.applied_seq;
                    if json {
                        println!("{}", serde_json::to_string(&board)?);
                    } else {
                        print!("{}", format_board(&board));
                    }
                }
            }
        }
    }

    scheduler.stop();
    Ok(())
}

fn format_board(board: &QuoteBoard) -> String {
    let mut out = format!(
        "=== Quotes #{} (updated {}) ===\n",
        board.applied_seq,
        board
            .last_updated
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );

    for (kind, quote) in board.quotes.iter() {
        out.push_str(&format!(
            "  {:<15} buy {:>12} sell {:>12} ref {:>12} chg {:>8} {}\n",
            kind.to_string(),
            quote.buy,
            quote.sell,
            quote.reference_price,
            quote.change,
            if quote.is_up { "▲" } else { "▼" }
        ));
    }

    if let Some(err) = &board.last_error {
        out.push_str(&format!("  last error: {}\n", err));
    }

    out
}

struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate_to(&self, decision: RoutingDecision) {
        info!("navigate → {}", decision);
    }
}

async fn run_bootstrap(
    config: EngineConfig,
    role: Option<String>,
    seen_onboarding: bool,
    init_delay_ms: u64,
    decision: Option<DecisionSnapshot>,
) -> eyre::Result<()> {
    let store = Arc::new(SessionStore::with_snapshot(SessionSnapshot::initializing()));
    let policy = decision.unwrap_or(config.bootstrap.decision);

    let mut handle = BootstrapHandle::spawn(
        store.clone(),
        Arc::new(TimedEntrance::from_config(&config.bootstrap)),
        Arc::new(LogNavigator),
        policy,
    );

    tokio::time::sleep(std::time::Duration::from_millis(init_delay_ms)).await;
    store.publish(SessionSnapshot {
        is_authenticated: role.is_some(),
        user: role.map(|role| SessionUser { role: Some(role) }),
        has_seen_onboarding: seen_onboarding,
        is_initializing: false,
    });

    let decision = handle.decision().await?;
    info!("부트스트랩 완료: {} ({:?})", decision, policy);
    Ok(())
}

struct LogRefresh;

#[async_trait]
impl RefreshAction for LogRefresh {
    async fn refresh(&self) -> Result<(), RefreshError> {
        info!("알림 갱신");
        Ok(())
    }
}

async fn run_notifications(config: EngineConfig) -> eyre::Result<()> {
    let store = Arc::new(SessionStore::with_snapshot(SessionSnapshot {
        is_authenticated: true,
        has_seen_onboarding: true,
        ..Default::default()
    }));
    let hub = Arc::new(LifecycleHub::new());

    let coordinator = LifecycleRefreshCoordinator::start(
        store.clone(),
        hub.clone(),
        Arc::new(LogRefresh),
        &config.refresh,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "bg" => hub.set_state(LifecycleState::Background),
                    "inactive" => hub.set_state(LifecycleState::Inactive),
                    "fg" => hub.set_state(LifecycleState::Active),
                    "logout" => store.publish(SessionSnapshot {
                        has_seen_onboarding: true,
                        ..Default::default()
                    }),
                    "login" => store.publish(SessionSnapshot {
                        is_authenticated: true,
                        has_seen_onboarding: true,
                        ..Default::default()
                    }),
                    "quit" => break,
                    other => info!("unknown command: {}", other),
                }
            }
        }
    }

    coordinator.stop();
    Ok(())
}
