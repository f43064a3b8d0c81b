pub mod error;
pub mod quote;
pub mod session;

pub use error::{BootstrapError, ConfigError, FeedError, LifecycleError, RefreshError};
pub use quote::{Quote, QuoteBoard, QuoteKind, QuoteSet, RawTicker, LOADING};
pub use session::{RoutingDecision, SessionSnapshot, SessionUser};
