pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod logger;
pub mod scheduler;
pub mod session;

pub use bootstrap::{
    run_bootstrap, BootstrapEffect, BootstrapHandle, BootstrapState, DecisionSnapshot,
    EntranceAnimation, Navigator, SessionBootstrapMachine, TimedEntrance,
};
pub use clock::{Clock, SystemClock};
pub use config::{BootstrapConfig, EngineConfig, FeedConfig, RefreshConfig};
pub use lifecycle::{
    LifecycleHub, LifecycleRefreshCoordinator, LifecycleSource, LifecycleState, RefreshAction,
};
pub use scheduler::QuoteFeedScheduler;
pub use session::{SessionSource, SessionStore, SessionSubscription};
