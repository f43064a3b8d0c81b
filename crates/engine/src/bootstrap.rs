use std::{future::Future, pin::Pin, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use interface::{BootstrapError, RoutingDecision, SessionSnapshot};

use crate::{config::BootstrapConfig, session::SessionSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// 아직 스냅샷을 받지 못함
    AwaitingSnapshot,
    /// 스냅샷은 있지만 세션 스토어가 초기화 중
    Initializing,
    /// 진입 애니메이션 재생 중
    Deciding,
    /// 라우팅 완료 (종료 상태)
    Navigated(RoutingDecision),
}

/// 애니메이션 종료 시점에 어떤 스냅샷으로 라우팅을 결정할지
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionSnapshot {
    /// 애니메이션이 끝날 때까지 관측된 가장 최근 스냅샷
    #[default]
    Latest,
    /// Deciding 으로 진입시킨 스냅샷
    Trigger,
}

impl FromStr for DecisionSnapshot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(DecisionSnapshot::Latest),
            "trigger" => Ok(DecisionSnapshot::Trigger),
            other => Err(format!("unknown decision snapshot: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapEffect {
    StartAnimation,
    Navigate(RoutingDecision),
}

/// 세션 부트스트랩 상태 머신 (I/O 없음)
///
/// `StartAnimation` 은 Deciding 에 처음 들어갈 때 한 번, `Navigate` 는
/// 애니메이션 완료 시 한 번만 나온다. `Navigated` 에서는 모든 입력이 무시된다.
#[derive(Debug, Clone)]
pub struct SessionBootstrapMachine {
    state: BootstrapState,
    policy: DecisionSnapshot,
    trigger: Option<SessionSnapshot>,
    latest: Option<SessionSnapshot>,
}

impl SessionBootstrapMachine {
    pub fn new(policy: DecisionSnapshot) -> Self {
        Self {
            state: BootstrapState::AwaitingSnapshot,
            policy,
            trigger: None,
            latest: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn decision(&self) -> Option<RoutingDecision> {
        match self.state {
            BootstrapState::Navigated(decision) => Some(decision),
            _ => None,
        }
    }

    pub fn on_snapshot(&mut self, snapshot: SessionSnapshot) -> Option<BootstrapEffect> {
        match self.state {
            BootstrapState::Navigated(_) => None,
            BootstrapState::Deciding => {
                // 초기화 중 스냅샷은 결정에 쓸 수 없음
                if !snapshot.is_initializing {
                    self.latest = Some(snapshot);
                }
                None
            }
            BootstrapState::AwaitingSnapshot | BootstrapState::Initializing => {
                if snapshot.is_initializing {
                    self.state = BootstrapState::Initializing;
                    self.latest = Some(snapshot);
                    return None;
                }

                self.state = BootstrapState::Deciding;
                self.trigger = Some(snapshot.clone());
                self.latest = Some(snapshot);
                Some(BootstrapEffect::StartAnimation)
            }
        }
    }

    pub fn on_animation_complete(&mut self) -> Option<BootstrapEffect> {
        if self.state != BootstrapState::Deciding {
            return None;
        }

        let snapshot = match self.policy {
            DecisionSnapshot::Latest => self.latest.as_ref(),
            DecisionSnapshot::Trigger => self.trigger.as_ref(),
        }?;

        let decision = snapshot.routing_decision();
        self.state = BootstrapState::Navigated(decision);
        Some(BootstrapEffect::Navigate(decision))
    }
}

/// 중간에 끊기지 않는 진입 애니메이션
#[async_trait]
pub trait EntranceAnimation: Send + Sync {
    async fn play(&self);
}

/// fade/scale in → hold → fade out
#[derive(Debug, Clone)]
pub struct TimedEntrance {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
}

impl TimedEntrance {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            fade_in: config.fade_in,
            hold: config.hold,
            fade_out: config.fade_out,
        }
    }

    pub fn total(&self) -> Duration {
        self.fade_in + self.hold + self.fade_out
    }
}

#[async_trait]
impl EntranceAnimation for TimedEntrance {
    async fn play(&self) {
        debug!("entrance: fade in");
        sleep(self.fade_in).await;
        debug!("entrance: hold");
        sleep(self.hold).await;
        debug!("entrance: fade out");
        sleep(self.fade_out).await;
    }
}

pub trait Navigator: Send + Sync {
    fn navigate_to(&self, decision: RoutingDecision);
}

type Playing<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// 세션 소스를 구독해 상태 머신을 돌리고 한 번만 라우팅한다
///
/// 스냅샷은 도착 순서대로 처리된다. 애니메이션 도중 소스가 닫혀도 애니메이션은
/// 끝까지 재생되고, 애니메이션 시작 전에 닫히면 `SourceClosed` 를 돌려준다.
pub async fn run_bootstrap(
    source: Arc<dyn SessionSource>,
    animation: Arc<dyn EntranceAnimation>,
    navigator: Arc<dyn Navigator>,
    policy: DecisionSnapshot,
) -> Result<RoutingDecision, BootstrapError> {
    let mut machine = SessionBootstrapMachine::new(policy);
    // 구독 먼저: current() 와 구독 사이의 업데이트를 놓치지 않도록
    let mut subscription = source.subscribe();
    let mut playing: Option<Playing<'_>> = None;

    if let Some(snapshot) = source.current() {
        if let Some(BootstrapEffect::StartAnimation) = machine.on_snapshot(snapshot) {
            info!("세션 준비 완료: 진입 애니메이션 시작");
            playing = Some(animation.play());
        }
    }

    let mut source_open = true;
    loop {
        if !source_open && playing.is_none() {
            warn!("session source closed in state {:?}", machine.state());
            return Err(BootstrapError::SourceClosed);
        }

        tokio::select! {
            _ = async {
                match playing.as_mut() {
                    Some(p) => p.await,
                    None => std::future::pending().await,
                }
            } => {
                playing = None;
                if let Some(BootstrapEffect::Navigate(decision)) = machine.on_animation_complete() {
                    info!("라우팅 결정: {}", decision);
                    navigator.navigate_to(decision);
                    return Ok(decision);
                }
            }
            next = subscription.next(), if source_open => match next {
                Some(snapshot) => {
                    if let Some(BootstrapEffect::StartAnimation) = machine.on_snapshot(snapshot) {
                        info!("세션 준비 완료: 진입 애니메이션 시작");
                        playing = Some(animation.play());
                    }
                }
                None => source_open = false,
            },
        }
    }
}

/// 백그라운드에서 실행 중인 부트스트랩
/// drop 하거나 `stop` 하면 애니메이션과 세션 구독이 정리된다
pub struct BootstrapHandle {
    task: JoinHandle<Result<RoutingDecision, BootstrapError>>,
}

impl BootstrapHandle {
    pub fn spawn(
        source: Arc<dyn SessionSource>,
        animation: Arc<dyn EntranceAnimation>,
        navigator: Arc<dyn Navigator>,
        policy: DecisionSnapshot,
    ) -> Self {
        Self {
            task: tokio::spawn(run_bootstrap(source, animation, navigator, policy)),
        }
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 결정이 날 때까지 대기. 중지된 경우 `Cancelled`
    pub async fn decision(&mut self) -> Result<RoutingDecision, BootstrapError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(_) => Err(BootstrapError::Cancelled),
        }
    }
}

impl Drop for BootstrapHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
