use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use interface::SessionSnapshot;

/// 외부 세션 상태 소스 (읽기 전용)
///
/// `subscribe` 가 돌려준 구독을 drop 하면 구독 해제된다.
pub trait SessionSource: Send + Sync {
    /// 현재 스냅샷. 아직 한 번도 발행되지 않았으면 None
    fn current(&self) -> Option<SessionSnapshot>;

    fn subscribe(&self) -> SessionSubscription;
}

/// 도착 순서대로 스냅샷을 받는 구독
pub struct SessionSubscription {
    rx: mpsc::UnboundedReceiver<SessionSnapshot>,
}

impl SessionSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SessionSnapshot>) -> Self {
        Self { rx }
    }

    /// 다음 스냅샷. 소스가 사라지면 None
    pub async fn next(&mut self) -> Option<SessionSnapshot> {
        self.rx.recv().await
    }

    /// 구독을 소비하며 채널을 닫는다. 이후 `publish` 에서 스토어 쪽 sender 가 정리된다
    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

#[derive(Default)]
struct StoreInner {
    current: Option<SessionSnapshot>,
    subscribers: Vec<mpsc::UnboundedSender<SessionSnapshot>>,
}

/// 인메모리 세션 스토어
/// 호스트의 인증 스토어가 상태가 바뀔 때마다 `publish` 한다
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        let store = Self::default();
        store.lock().current = Some(snapshot);
        store
    }

    /// 스냅샷을 저장하고 모든 구독자에게 전달. 닫힌 구독은 여기서 정리된다
    pub fn publish(&self, snapshot: SessionSnapshot) {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
        inner.current = Some(snapshot);
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionSource for SessionStore {
    fn current(&self) -> Option<SessionSnapshot> {
        self.lock().current.clone()
    }

    fn subscribe(&self) -> SessionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        SessionSubscription::new(rx)
    }
}
