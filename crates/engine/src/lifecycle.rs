use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use interface::{LifecycleError, RefreshError, SessionSnapshot};

use crate::{config::RefreshConfig, session::SessionSource};

/// 호스트 프로세스의 라이프사이클 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Inactive,
    Background,
}

impl LifecycleState {
    /// background/inactive → active 전환인지
    pub fn is_foregrounding(previous: LifecycleState, next: LifecycleState) -> bool {
        previous != LifecycleState::Active && next == LifecycleState::Active
    }
}

/// OS 라이프사이클 이벤트 소스
pub trait LifecycleSource: Send + Sync {
    fn current(&self) -> LifecycleState;

    fn subscribe(&self) -> Result<broadcast::Receiver<LifecycleState>, LifecycleError>;
}

/// 호스트가 OS 이벤트를 흘려 넣는 인프로세스 라이프사이클 소스
pub struct LifecycleHub {
    tx: broadcast::Sender<LifecycleState>,
    current: Mutex<LifecycleState>,
}

impl Default for LifecycleHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleHub {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(16).0,
            current: Mutex::new(LifecycleState::Active),
        }
    }

    pub fn set_state(&self, state: LifecycleState) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = state;
        // 구독자가 없으면 Err, 무시
        let _ = self.tx.send(state);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl LifecycleSource for LifecycleHub {
    fn current(&self) -> LifecycleState {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<LifecycleState>, LifecycleError> {
        Ok(self.tx.subscribe())
    }
}

/// 주입되는 갱신 동작 (예: 알림 목록 다시 불러오기)
#[async_trait]
pub trait RefreshAction: Send + Sync {
    async fn refresh(&self) -> Result<(), RefreshError>;
}

pub type SessionPredicate = Arc<dyn Fn(&SessionSnapshot) -> bool + Send + Sync>;

/// 세션이 활성인 동안 갱신 동작을 주기적으로, 그리고 포그라운드 전환마다 실행
///
/// 활성화되면 즉시 한 번 실행하고 `refresh_interval` 마다 반복한다.
/// 세션이 비활성이 되면 타이머와 라이프사이클 구독을 모두 해제하고,
/// 다시 활성화되면 처음부터 시작한다. 각 실행은 독립적으로 spawn 된다.
pub struct LifecycleRefreshCoordinator {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

impl LifecycleRefreshCoordinator {
    /// `is_authenticated` 를 세션 활성 조건으로 사용
    pub fn start(
        session: Arc<dyn SessionSource>,
        lifecycle: Arc<dyn LifecycleSource>,
        action: Arc<dyn RefreshAction>,
        config: &RefreshConfig,
    ) -> Self {
        Self::start_with_predicate(
            session,
            lifecycle,
            action,
            config,
            Arc::new(|s: &SessionSnapshot| s.is_authenticated),
        )
    }

    pub fn start_with_predicate(
        session: Arc<dyn SessionSource>,
        lifecycle: Arc<dyn LifecycleSource>,
        action: Arc<dyn RefreshAction>,
        config: &RefreshConfig,
        is_active: SessionPredicate,
    ) -> Self {
        let cancel = CancellationToken::new();
        let supervisor = tokio::spawn(supervise(
            session,
            lifecycle,
            action,
            config.refresh_interval,
            is_active,
            cancel.clone(),
        ));

        Self { cancel, supervisor }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
        self.supervisor.abort();
    }
}

impl Drop for LifecycleRefreshCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 현재 활성 구간의 실행 상태
struct Activation {
    lifecycle: Arc<dyn LifecycleSource>,
    action: Arc<dyn RefreshAction>,
    period: Duration,
    parent: CancellationToken,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Activation {
    fn set(&mut self, active: bool) {
        match (active, self.running.is_some()) {
            (true, false) => {
                info!("세션 활성: 갱신 타이머 시작 ({}s 간격)", self.period.as_secs());
                let token = self.parent.child_token();
                let task = tokio::spawn(run_active(
                    Arc::clone(&self.lifecycle),
                    Arc::clone(&self.action),
                    self.period,
                    token.clone(),
                ));
                self.running = Some((token, task));
            }
            (false, true) => {
                info!("세션 비활성: 갱신 타이머 및 라이프사이클 구독 해제");
                self.clear();
            }
            _ => {}
        }
    }

    fn clear(&mut self) {
        if let Some((token, task)) = self.running.take() {
            token.cancel();
            task.abort();
        }
    }
}

async fn supervise(
    session: Arc<dyn SessionSource>,
    lifecycle: Arc<dyn LifecycleSource>,
    action: Arc<dyn RefreshAction>,
    period: Duration,
    is_active: SessionPredicate,
    cancel: CancellationToken,
) {
    let mut subscription = session.subscribe();
    let mut activation = Activation {
        lifecycle,
        action,
        period,
        parent: cancel.clone(),
        running: None,
    };

    if let Some(snapshot) = session.current() {
        activation.set(is_active(&snapshot));
    }

    let mut source_open = true;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = subscription.next(), if source_open => match next {
                Some(snapshot) => activation.set(is_active(&snapshot)),
                None => {
                    // 마지막으로 본 세션 상태를 유지
                    warn!("session source closed; keeping last activation state");
                    source_open = false;
                }
            },
        }
    }

    activation.clear();
}

async fn run_active(
    lifecycle: Arc<dyn LifecycleSource>,
    action: Arc<dyn RefreshAction>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut events = match lifecycle.subscribe() {
        Ok(rx) => Some(rx),
        Err(e) => {
            warn!("lifecycle subscription failed, timer only: {}", e);
            None
        }
    };
    let mut last_state = lifecycle.current();

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            // 첫 tick 이 즉시 실행분
            _ = ticker.tick() => fire(&action, "timer"),
            event = next_event(&mut events) => match event {
                LifecycleEvent::Changed(next) => {
                    if LifecycleState::is_foregrounding(last_state, next) {
                        fire(&action, "foreground");
                    }
                    last_state = next;
                }
                LifecycleEvent::Lagged(n) => {
                    // 밀린 이벤트 중에 포그라운드 전환이 있었을 수 있으므로 현재 상태로 보정
                    let now = lifecycle.current();
                    warn!("lifecycle receiver lagged by {} events, resync to {:?}", n, now);
                    if LifecycleState::is_foregrounding(last_state, now) {
                        fire(&action, "foreground (resync)");
                    }
                    last_state = now;
                }
                LifecycleEvent::Closed => {
                    warn!("lifecycle source closed, timer only");
                    events = None;
                }
            },
        }
    }
}

enum LifecycleEvent {
    Changed(LifecycleState),
    Lagged(u64),
    Closed,
}

async fn next_event(events: &mut Option<broadcast::Receiver<LifecycleState>>) -> LifecycleEvent {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };

    match rx.recv().await {
        Ok(state) => LifecycleEvent::Changed(state),
        Err(RecvError::Lagged(n)) => LifecycleEvent::Lagged(n),
        Err(RecvError::Closed) => LifecycleEvent::Closed,
    }
}

fn fire(action: &Arc<dyn RefreshAction>, reason: &'static str) {
    debug!("refresh triggered by {}", reason);
    let action = Arc::clone(action);
    tokio::spawn(async move {
        if let Err(e) = action.refresh().await {
            warn!("refresh ({}) failed: {}", reason, e);
        }
    });
}
