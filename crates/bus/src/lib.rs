//! # Tickwire Bus
//!
//! In-process scoped broadcast broker.
//!
//! ## Components
//!
//! - `SubscriptionScope` / `PublishScope` - Visibility rules for events
//! - `EventBus` - Thread-safe publish/subscribe with failure policy
//! - `FailureLog` - Bounded record of non-critical handler failures

mod event_bus;
mod failure_log;
mod scope;

pub use event_bus::{Event, EventBus, HandlerFn, PublishOutcome, Subscription};
pub use failure_log::{FailureLog, FailureStats};
pub use scope::{PublishScope, SubscriptionScope};
