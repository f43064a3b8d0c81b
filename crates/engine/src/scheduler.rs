use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use feeds::{normalize, SymbolMap, TickerFeed};
use interface::{QuoteBoard, QuoteSet};

use crate::{clock::Clock, config::FeedConfig};

struct Inner {
    feed: Arc<dyn TickerFeed>,
    symbols: SymbolMap,
    clock: Arc<dyn Clock>,
    board: watch::Sender<QuoteBoard>,
    /// 마지막으로 발급한 요청 번호
    issued_seq: AtomicU64,
    in_flight: AtomicUsize,
    cancel: CancellationToken,
}

impl Inner {
    /// fetch → normalize → apply 한 사이클
    async fn run_cycle(self: Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }

        let seq = self.issued_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.board.send_if_modified(|board| {
            if self.cancel.is_cancelled() {
                return false;
            }
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let changed = !board.is_refreshing;
            board.is_refreshing = true;
            changed
        });

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.feed.fetch_tickers() => result,
        };

        let now = self.clock.now();

        self.board.send_if_modified(|board| {
            // 중지 이후에는 어떤 상태도 바꾸지 않는다
            if self.cancel.is_cancelled() {
                return false;
            }

            let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            board.is_refreshing = remaining > 0;

            match result {
                Ok(tickers) if seq > board.applied_seq => {
                    board.quotes = normalize(&board.quotes, &tickers, &self.symbols);
                    board.applied_seq = seq;
                    board.last_updated = Some(now);
                    board.last_error = None;
                    debug!("quote cycle #{} applied ({} tickers)", seq, tickers.len());
                }
                Ok(_) => {
                    debug!(
                        "quote cycle #{} discarded: #{} already applied",
                        seq, board.applied_seq
                    );
                }
                Err(e) => {
                    warn!("quote fetch error from {}: {}", self.feed.name(), e);
                    board.last_error = Some(e.to_string());
                }
            }

            true
        });
    }
}

/// 시세 피드를 고정 주기로 폴링하고 최신 시세판을 공개한다
///
/// 시작 즉시 한 사이클을 돌고 이후 `poll_interval` 마다 반복한다.
/// 사이클끼리는 겹칠 수 있고, 응답은 발급 순서상 가장 최근 것만 반영된다.
/// 실패한 사이클은 기록만 남기고 직전 시세를 유지한다.
/// `stop` 또는 drop 이후에는 시세판이 바뀌지 않는다.
pub struct QuoteFeedScheduler {
    inner: Arc<Inner>,
    ticker: JoinHandle<()>,
}

impl QuoteFeedScheduler {
    /// tokio 런타임 안에서 호출해야 한다
    pub fn start(feed: Arc<dyn TickerFeed>, config: &FeedConfig, clock: Arc<dyn Clock>) -> Self {
        let (board, _) = watch::channel(QuoteBoard::default());

        let inner = Arc::new(Inner {
            feed,
            symbols: config.symbols.clone(),
            clock,
            board,
            issued_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        });

        info!(
            "시세 폴링 시작: {} ({}ms 간격)",
            inner.feed.name(),
            config.poll_interval.as_millis()
        );

        let ticker = tokio::spawn(run_ticker(Arc::clone(&inner), config.poll_interval));

        Self { inner, ticker }
    }

    pub fn board(&self) -> QuoteBoard {
        self.inner.board.borrow().clone()
    }

    pub fn quotes(&self) -> QuoteSet {
        self.inner.board.borrow().quotes.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.board.borrow().is_refreshing
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.board.borrow().last_updated
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.board.borrow().last_error.clone()
    }

    /// 시세판이 바뀔 때마다 알림을 받는 receiver
    pub fn subscribe(&self) -> watch::Receiver<QuoteBoard> {
        self.inner.board.subscribe()
    }

    /// 주기와 별개로 사이클 하나를 즉시 시작한다. 진행 중인 사이클이 있어도 된다
    pub fn refresh_now(&self) {
        if self.inner.cancel.is_cancelled() {
            debug!("refresh_now ignored: scheduler stopped");
            return;
        }
        tokio::spawn(Arc::clone(&self.inner).run_cycle());
    }

    pub fn is_active(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// 타이머와 진행 중인 사이클을 모두 정리
    pub fn stop(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        self.ticker.abort();
        info!("시세 폴링 중지: {}", self.inner.feed.name());
    }
}

impl Drop for QuoteFeedScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticker(inner: Arc<Inner>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            // 첫 tick 은 즉시 발생
            _ = ticker.tick() => {
                tokio::spawn(Arc::clone(&inner).run_cycle());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use async_trait::async_trait;
    use tokio::time::{sleep, Instant};

    use super::*;
    use interface::{FeedError, RawTicker};

    const PERIOD: Duration = Duration::from_millis(1000);

    /// 호출마다 스크립트를 하나씩 소비하는 피드
    struct ScriptedFeed {
        script: Mutex<VecDeque<(Duration, Result<Vec<RawTicker>, String>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(script: Vec<(Duration, Result<Vec<RawTicker>, String>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TickerFeed for ScriptedFeed {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_tickers(&self) -> Result<Vec<RawTicker>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some((delay, result)) => {
                    sleep(delay).await;
                    result.map_err(FeedError::Other)
                }
                None => Err(FeedError::Other("script exhausted".to_string())),
            }
        }
    }

    /// 일시정지된 tokio 시간을 따라가는 시계
    struct PausedClock {
        origin: Instant,
        base: DateTime<Utc>,
    }

    impl PausedClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                base: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            })
        }

        fn at(&self, offset: Duration) -> DateTime<Utc> {
            self.base + chrono::Duration::from_std(offset).unwrap()
        }
    }

    impl Clock for PausedClock {
        fn now(&self) -> DateTime<Utc> {
            self.at(self.origin.elapsed())
        }
    }

    fn gold(buy: &str, chg: &str) -> Vec<RawTicker> {
        vec![RawTicker {
            symbol: Some("GOLD".to_string()),
            buy: Some(buy.to_string()),
            chg: Some(chg.to_string()),
            ..Default::default()
        }]
    }

    fn ok(buy: &str) -> (Duration, Result<Vec<RawTicker>, String>) {
        (Duration::ZERO, Ok(gold(buy, "1")))
    }

    fn fail() -> (Duration, Result<Vec<RawTicker>, String>) {
        (Duration::ZERO, Err("timeout".to_string()))
    }

    fn config(period: Duration) -> FeedConfig {
        FeedConfig {
            poll_interval: period,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately() {
        let feed = ScriptedFeed::new(vec![ok("41,200")]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());

        sleep(Duration::from_millis(10)).await;

        assert_eq!(feed.calls(), 1);
        assert_eq!(scheduler.quotes().gold.buy, "41,200");
        assert!(scheduler.quotes().gold.is_up);
        assert!(scheduler.quotes().silver.is_loading());
        assert!(!scheduler.is_refreshing());
        assert_eq!(scheduler.board().applied_seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_fixed_period() {
        let feed = ScriptedFeed::new(vec![ok("1"), ok("2"), ok("3"), ok("4")]);
        let _scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());

        sleep(Duration::from_millis(3500)).await;
        // t = 0, 1000, 2000, 3000
        assert_eq!(feed.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_updated_tracks_latest_success_only() {
        let feed = ScriptedFeed::new(vec![ok("1"), fail(), ok("3"), fail(), fail()]);
        let clock = PausedClock::new();
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), clock.clone());

        sleep(Duration::from_millis(4500)).await;

        assert_eq!(feed.calls(), 5);
        assert_eq!(
            scheduler.last_updated(),
            Some(clock.at(Duration::from_millis(2000)))
        );
        assert_eq!(scheduler.quotes().gold.buy, "3");
        assert!(scheduler.last_error().unwrap().contains("timeout"));
        assert!(!scheduler.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_last_good_quotes_and_success_clears_error() {
        let feed = ScriptedFeed::new(vec![ok("41,200"), fail(), ok("41,300")]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(scheduler.quotes().gold.buy, "41,200");
        assert!(scheduler.last_error().is_some());

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(scheduler.quotes().gold.buy, "41,300");
        assert_eq!(scheduler.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_feed_never_shows_loading_after_data() {
        let feed = ScriptedFeed::new(vec![ok("41,200")]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());

        // 스크립트 소진 후에는 매번 실패
        sleep(Duration::from_millis(5500)).await;
        assert_eq!(feed.calls(), 6);
        assert_eq!(scheduler.quotes().gold.buy, "41,200");
        assert!(!scheduler.quotes().gold.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_while_refreshing() {
        let feed = ScriptedFeed::new(vec![
            (Duration::from_millis(300), Ok(gold("first", "1"))),
            (Duration::from_millis(50), Ok(gold("second", "-1"))),
        ]);
        let scheduler = QuoteFeedScheduler::start(
            feed.clone(),
            &config(Duration::from_secs(60)),
            PausedClock::new(),
        );

        sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_refreshing());

        scheduler.refresh_now();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(feed.calls(), 2);
        assert!(scheduler.is_refreshing());

        // 두 번째 요청 완료, 첫 번째는 아직 진행 중
        sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_refreshing());
        assert_eq!(scheduler.quotes().gold.buy, "second");

        sleep(Duration::from_millis(200)).await;
        assert!(!scheduler.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let feed = ScriptedFeed::new(vec![
            (Duration::from_millis(300), Ok(gold("stale", "1"))),
            (Duration::from_millis(50), Ok(gold("fresh", "-1"))),
        ]);
        let scheduler = QuoteFeedScheduler::start(
            feed.clone(),
            &config(Duration::from_secs(60)),
            PausedClock::new(),
        );

        sleep(Duration::from_millis(100)).await;
        scheduler.refresh_now();
        sleep(Duration::from_millis(500)).await;

        // 먼저 보낸 요청이 나중에 도착해도 반영되지 않는다
        let board = scheduler.board();
        assert_eq!(board.quotes.gold.buy, "fresh");
        assert!(!board.quotes.gold.is_up);
        assert_eq!(board.applied_seq, 2);
        assert!(!board.is_refreshing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_mutation_after_stop() {
        let feed = ScriptedFeed::new(vec![ok("1"), ok("2"), ok("3"), ok("4"), ok("5")]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());
        let mut rx = scheduler.subscribe();

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(feed.calls(), 2);

        scheduler.stop();
        rx.borrow_and_update();
        let before = scheduler.board();

        sleep(PERIOD * 5).await;
        scheduler.refresh_now();
        sleep(PERIOD).await;

        assert_eq!(feed.calls(), 2);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(scheduler.board(), before);
        assert!(!scheduler.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cycle_is_dropped_on_stop() {
        let feed = ScriptedFeed::new(vec![(Duration::from_millis(500), Ok(gold("late", "1")))]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());
        let mut rx = scheduler.subscribe();

        sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_refreshing());
        scheduler.stop();
        rx.borrow_and_update();

        sleep(PERIOD * 3).await;
        assert!(!rx.has_changed().unwrap());
        assert!(scheduler.quotes().gold.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let feed = ScriptedFeed::new(vec![ok("1"), ok("2")]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());

        sleep(Duration::from_millis(10)).await;
        drop(scheduler);

        sleep(PERIOD * 4).await;
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_updates() {
        let feed = ScriptedFeed::new(vec![ok("41,200")]);
        let scheduler = QuoteFeedScheduler::start(feed.clone(), &config(PERIOD), PausedClock::new());
        let mut rx = scheduler.subscribe();

        rx.wait_for(|board| board.applied_seq == 1).await.unwrap();
        assert_eq!(rx.borrow().quotes.gold.buy, "41,200");
    }
}
