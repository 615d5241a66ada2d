//! EventBus - Scoped broadcast broker
//!
//! ## Delivery
//!
//! `publish` takes the registry lock only long enough to snapshot the
//! subscriptions registered for an event name and filter them by scope. The
//! lock is released before any handler runs, so handlers may subscribe,
//! unsubscribe or publish on the same bus from the same thread, and a slow
//! handler never blocks registration on other threads.
//!
//! ## Failure policy
//!
//! - Critical handler fails: the error is returned to the publisher at once
//!   and the remaining subscribers of that publish call are skipped.
//! - Non-critical handler fails: the failure is logged and recorded in the
//!   [`FailureLog`], and delivery continues.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bus::{EventBus, PublishScope, SubscriptionScope};
//!
//! let bus = Arc::new(EventBus::<Quote>::new());
//!
//! let id = bus.subscribe(
//!     "quotes.ready",
//!     |event| { record(event.payload()); Ok(()) },
//!     SubscriptionScope::isolated("desk-a"),
//!     false,
//! )?;
//!
//! bus.publish("quotes.ready", quote, PublishScope::group("desk-a"))?;
//! bus.unsubscribe(id);
//! ```

use crate::failure_log::{FailureLog, FailureStats};
use crate::scope::{PublishScope, SubscriptionScope};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use shared::{
    BusConfig, CriticalHandlerError, NonCriticalHandlerFailure, ScopeConfigurationError,
    SubscriptionId,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Handler function type
pub type HandlerFn<P> = Arc<dyn Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync>;

/// A published event
///
/// Constructed by `publish`, lent to each matching handler, then dropped.
#[derive(Debug, Clone)]
pub struct Event<P> {
    name: String,
    payload: P,
    scope: PublishScope,
}

impl<P> Event<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn scope(&self) -> &PublishScope {
        &self.scope
    }
}

/// A registered handler
pub struct Subscription<P> {
    id: SubscriptionId,
    event_name: String,
    scope: SubscriptionScope,
    is_critical: bool,
    handler: HandlerFn<P>,
}

impl<P> Subscription<P> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn scope(&self) -> &SubscriptionScope {
        &self.scope
    }

    pub fn is_critical(&self) -> bool {
        self.is_critical
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_name", &self.event_name)
            .field("scope", &self.scope)
            .field("is_critical", &self.is_critical)
            .finish()
    }
}

/// Counters for one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscriptions whose scope accepted the event
    pub matched: usize,
    /// Handlers that returned successfully
    pub delivered: usize,
    /// Non-critical handlers that failed
    pub failed: usize,
}

/// Subscriptions by event name, in registration order
struct Registry<P> {
    by_event: HashMap<String, Vec<Arc<Subscription<P>>>>,
    index: HashMap<SubscriptionId, String>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self {
            by_event: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

/// The event bus - shared by every publisher and subscriber of a process
pub struct EventBus<P> {
    registry: RwLock<Registry<P>>,
    failures: Mutex<FailureLog>,
}

impl<P> EventBus<P>
where
    P: Send + Sync + 'static,
{
    /// Create a new empty event bus
    pub fn new() -> Self {
        Self::with_config(&BusConfig::default())
    }

    /// Create an event bus with explicit settings
    pub fn with_config(config: &BusConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            failures: Mutex::new(FailureLog::new(config.failure_log_capacity)),
        }
    }

    /// Register a handler for `event_name`
    ///
    /// The scope is validated here; a malformed scope is rejected, never
    /// coerced.
    pub fn subscribe<F>(
        &self,
        event_name: impl Into<String>,
        handler: F,
        scope: SubscriptionScope,
        is_critical: bool,
    ) -> Result<SubscriptionId, ScopeConfigurationError>
    where
        F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_handler(event_name, Arc::new(handler), scope, is_critical)
    }

    /// Register an already shared handler
    pub fn subscribe_handler(
        &self,
        event_name: impl Into<String>,
        handler: HandlerFn<P>,
        scope: SubscriptionScope,
        is_critical: bool,
    ) -> Result<SubscriptionId, ScopeConfigurationError> {
        scope.validate()?;

        let event_name = event_name.into();
        let id = SubscriptionId::generate();
        let subscription = Arc::new(Subscription {
            id,
            event_name: event_name.clone(),
            scope,
            is_critical,
            handler,
        });

        {
            let mut registry = self.registry.write();
            registry
                .by_event
                .entry(event_name.clone())
                .or_default()
                .push(subscription);
            registry.index.insert(id, event_name.clone());
        }

        debug!(subscription = %id, event = %event_name, critical = is_critical, "Subscribed");
        Ok(id)
    }

    /// Remove a subscription
    ///
    /// Unknown ids are ignored so that shutdown sequences can run twice.
    /// Returns whether something was removed. A publish already in flight
    /// still delivers to the removed handler.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write();

        let event_name = match registry.index.remove(&id) {
            Some(name) => name,
            None => {
                debug!(subscription = %id, "Unsubscribe of unknown id ignored");
                return false;
            }
        };

        if let Some(subscriptions) = registry.by_event.get_mut(&event_name) {
            subscriptions.retain(|s| s.id != id);
            if subscriptions.is_empty() {
                registry.by_event.remove(&event_name);
            }
        }

        debug!(subscription = %id, event = %event_name, "Unsubscribed");
        true
    }

    /// Publish an event to every subscriber whose scope accepts it
    ///
    /// Handlers run on the calling thread, in registration order.
    pub fn publish(
        &self,
        event_name: &str,
        payload: P,
        scope: PublishScope,
    ) -> Result<PublishOutcome, CriticalHandlerError> {
        let matching = self.snapshot(event_name, &scope);

        let mut outcome = PublishOutcome {
            matched: matching.len(),
            ..Default::default()
        };
        if matching.is_empty() {
            debug!(event = event_name, scope = %scope, "No subscribers");
            return Ok(outcome);
        }

        let event = Event {
            name: event_name.to_string(),
            payload,
            scope,
        };

        for subscription in matching {
            match (subscription.handler)(&event) {
                Ok(()) => outcome.delivered += 1,
                Err(err) if subscription.is_critical => {
                    error!(
                        event = event_name,
                        subscription = %subscription.id,
                        error = %err,
                        "Critical handler failed, aborting delivery"
                    );
                    return Err(CriticalHandlerError {
                        event_name: event_name.to_string(),
                        subscription_id: subscription.id,
                        source: err.into(),
                    });
                }
                Err(err) => {
                    outcome.failed += 1;
                    self.record_failure(event_name, subscription.id, &err);
                }
            }
        }

        Ok(outcome)
    }

    /// Publish a platform-wide event
    pub fn publish_global(
        &self,
        event_name: &str,
        payload: P,
    ) -> Result<PublishOutcome, CriticalHandlerError> {
        self.publish(event_name, payload, PublishScope::Global)
    }

    /// Number of live subscriptions across all event names
    pub fn subscription_count(&self) -> usize {
        self.registry.read().index.len()
    }

    /// Number of subscriptions registered for one event name
    pub fn subscribers_for(&self, event_name: &str) -> usize {
        self.registry
            .read()
            .by_event
            .get(event_name)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Whether a subscription id is still registered
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.registry.read().index.contains_key(&id)
    }

    /// Drop every subscription
    pub fn clear(&self) {
        let mut registry = self.registry.write();
        registry.by_event.clear();
        registry.index.clear();
    }

    /// Most recent non-critical failures first
    pub fn recent_failures(&self, limit: usize) -> Vec<NonCriticalHandlerFailure> {
        self.failures
            .lock()
            .get_recent(limit)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn failure_stats(&self) -> FailureStats {
        self.failures.lock().get_stats()
    }

    /// Retained failures as JSON, oldest first
    pub fn export_failures(&self) -> serde_json::Value {
        self.failures.lock().export_json()
    }

    fn snapshot(&self, event_name: &str, scope: &PublishScope) -> Vec<Arc<Subscription<P>>> {
        let registry = self.registry.read();
        registry
            .by_event
            .get(event_name)
            .map(|subs| {
                subs.iter()
                    .filter(|s| s.scope.should_receive(scope))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record_failure(&self, event_name: &str, id: SubscriptionId, err: &anyhow::Error) {
        let message = format!("{:#}", err);
        warn!(
            event = event_name,
            subscription = %id,
            error = %message,
            "Non-critical handler failed, continuing delivery"
        );
        self.failures.lock().record(NonCriticalHandlerFailure {
            event_name: event_name.to_string(),
            subscription_id: id,
            message,
            occurred_at: Utc::now(),
        });
    }
}

impl<P> Default for EventBus<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("EventBus")
            .field("event_names", &registry.by_event.len())
            .field("subscriptions", &registry.index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn recorder(
        seen: &Seen,
        label: &'static str,
    ) -> impl Fn(&Event<u32>) -> anyhow::Result<()> + Send + Sync + 'static {
        let seen = Arc::clone(seen);
        move |_event| {
            seen.lock().push(label.to_string());
            Ok(())
        }
    }

    // ============== Basic Delivery Tests ==============

    #[test]
    fn test_publish_delivers_payload() {
        let bus = EventBus::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&total);

        bus.subscribe(
            "tick",
            move |event| {
                sink.fetch_add(*event.payload() as usize, Ordering::SeqCst);
                Ok(())
            },
            SubscriptionScope::Global,
            false,
        )
        .unwrap();

        let outcome = bus.publish_global("tick", 7).unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::<u32>::new();
        let outcome = bus.publish_global("nobody.listens", 1).unwrap();
        assert_eq!(outcome, PublishOutcome::default());
    }

    #[test]
    fn test_delivery_follows_registration_order() {
        let bus = EventBus::<u32>::new();
        let seen: Seen = Arc::default();

        bus.subscribe("tick", recorder(&seen, "first"), SubscriptionScope::Global, false)
            .unwrap();
        bus.subscribe("tick", recorder(&seen, "second"), SubscriptionScope::Global, false)
            .unwrap();
        bus.subscribe("other", recorder(&seen, "other"), SubscriptionScope::Global, false)
            .unwrap();

        bus.publish_global("tick", 0).unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_group_event_reaches_matching_scopes_only() {
        let bus = EventBus::<u32>::new();
        let seen: Seen = Arc::default();

        bus.subscribe("fill", recorder(&seen, "global"), SubscriptionScope::Global, false)
            .unwrap();
        let desk_a = SubscriptionScope::isolated("desk-a");
        bus.subscribe("fill", recorder(&seen, "desk-a"), desk_a, false).unwrap();
        let desk_b = SubscriptionScope::isolated("desk-b");
        bus.subscribe("fill", recorder(&seen, "desk-b"), desk_b, false).unwrap();
        bus.subscribe("fill", recorder(&seen, "platform"), SubscriptionScope::all_groups(), false)
            .unwrap();

        let outcome = bus.publish("fill", 1, PublishScope::group("desk-a")).unwrap();
        assert_eq!(outcome.matched, 2);
        assert_eq!(*seen.lock(), vec!["desk-a", "platform"]);
    }

    #[test]
    fn test_subscribe_rejects_malformed_scope() {
        let bus = EventBus::<u32>::new();
        let result = bus.subscribe("tick", |_| Ok(()), SubscriptionScope::isolated(""), false);

        assert!(result.is_err());
        assert_eq!(bus.subscription_count(), 0);
    }

    // ============== Failure Policy Tests ==============

    #[test]
    fn test_non_critical_failure_does_not_stop_delivery() {
        let bus = EventBus::<u32>::new();
        let seen: Seen = Arc::default();

        bus.subscribe("tick", recorder(&seen, "one"), SubscriptionScope::Global, false)
            .unwrap();
        let failing = bus
            .subscribe(
                "tick",
                |_| Err(anyhow!("stale quote")),
                SubscriptionScope::Global,
                false,
            )
            .unwrap();
        bus.subscribe("tick", recorder(&seen, "three"), SubscriptionScope::Global, false)
            .unwrap();

        let outcome = bus.publish_global("tick", 0).unwrap();

        assert_eq!(*seen.lock(), vec!["one", "three"]);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 1);

        let failures = bus.recent_failures(10);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subscription_id, failing);
        assert_eq!(failures[0].event_name, "tick");
        assert!(failures[0].message.contains("stale quote"));

        let exported = bus.export_failures();
        assert_eq!(exported[0]["eventName"], "tick");
        assert_eq!(exported[0]["subscriptionId"], serde_json::to_value(failing).unwrap());
    }

    #[test]
    fn test_critical_failure_aborts_delivery() {
        let bus = EventBus::<u32>::new();
        let seen: Seen = Arc::default();

        bus.subscribe("tick", recorder(&seen, "one"), SubscriptionScope::Global, false)
            .unwrap();
        let critical = bus
            .subscribe(
                "tick",
                |_| Err(anyhow!("ledger unavailable")),
                SubscriptionScope::Global,
                true,
            )
            .unwrap();
        bus.subscribe("tick", recorder(&seen, "three"), SubscriptionScope::Global, false)
            .unwrap();

        let err = bus.publish_global("tick", 0).unwrap_err();

        assert_eq!(*seen.lock(), vec!["one"]);
        assert_eq!(err.subscription_id, critical);
        assert_eq!(err.event_name, "tick");
        assert!(err.to_string().contains("ledger unavailable"));
        assert_eq!(bus.failure_stats().total_recorded, 0);
    }

    #[test]
    fn test_critical_handler_success_is_plain_delivery() {
        let bus = EventBus::<u32>::new();
        bus.subscribe("tick", |_| Ok(()), SubscriptionScope::Global, true)
            .unwrap();

        let outcome = bus.publish_global("tick", 0).unwrap();
        assert_eq!(outcome.delivered, 1);
    }

    // ============== Unsubscribe Tests ==============

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::<u32>::new();
        let id = bus
            .subscribe("tick", |_| Ok(()), SubscriptionScope::Global, false)
            .unwrap();

        assert!(bus.is_subscribed(id));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscription_count(), 0);
        assert_eq!(bus.subscribers_for("tick"), 0);
    }

    #[test]
    fn test_unsubscribed_handler_no_longer_receives() {
        let bus = EventBus::<u32>::new();
        let seen: Seen = Arc::default();
        let id = bus
            .subscribe("tick", recorder(&seen, "gone"), SubscriptionScope::Global, false)
            .unwrap();

        bus.unsubscribe(id);
        bus.publish_global("tick", 0).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let bus = EventBus::<u32>::new();
        bus.subscribe("a", |_| Ok(()), SubscriptionScope::Global, false)
            .unwrap();
        bus.subscribe("b", |_| Ok(()), SubscriptionScope::Global, false)
            .unwrap();

        bus.clear();
        assert_eq!(bus.subscription_count(), 0);
    }

    // ============== Re-entrancy Tests ==============

    #[test]
    fn test_handler_can_publish_and_subscribe_on_same_bus() {
        let bus = Arc::new(EventBus::<u32>::new());
        let seen: Seen = Arc::default();

        bus.subscribe("second", recorder(&seen, "second"), SubscriptionScope::Global, false)
            .unwrap();

        let inner_bus = Arc::clone(&bus);
        let inner_seen = Arc::clone(&seen);
        bus.subscribe(
            "first",
            move |event| {
                inner_seen.lock().push("first".to_string());
                inner_bus.subscribe("late", |_| Ok(()), SubscriptionScope::Global, false)?;
                inner_bus.publish_global("second", *event.payload())?;
                Ok(())
            },
            SubscriptionScope::Global,
            true,
        )
        .unwrap();

        bus.publish_global("first", 1).unwrap();

        assert_eq!(*seen.lock(), vec!["first", "second"]);
        assert_eq!(bus.subscribers_for("late"), 1);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself() {
        let bus = Arc::new(EventBus::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::default();

        let inner_bus = Arc::clone(&bus);
        let inner_calls = Arc::clone(&calls);
        let inner_id = Arc::clone(&own_id);
        let id = bus
            .subscribe(
                "once",
                move |_| {
                    inner_calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(id) = *inner_id.lock() {
                        inner_bus.unsubscribe(id);
                    }
                    Ok(())
                },
                SubscriptionScope::Global,
                false,
            )
            .unwrap();
        *own_id.lock() = Some(id);

        bus.publish_global("once", 0).unwrap();
        bus.publish_global("once", 0).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ============== Concurrency Tests ==============

    #[test]
    fn test_concurrent_subscribe_and_publish() {
        let bus = Arc::new(EventBus::<u32>::new());
        let delivered = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bus = Arc::clone(&bus);
                let delivered = Arc::clone(&delivered);
                thread::spawn(move || {
                    let sink = Arc::clone(&delivered);
                    let id = bus
                        .subscribe(
                            format!("worker-{}", i),
                            move |_| {
                                sink.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            },
                            SubscriptionScope::Global,
                            false,
                        )
                        .unwrap();
                    for _ in 0..50 {
                        bus.publish_global(&format!("worker-{}", i), 0).unwrap();
                    }
                    bus.unsubscribe(id);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(delivered.load(Ordering::SeqCst), 8 * 50);
        assert_eq!(bus.subscription_count(), 0);
    }
}
