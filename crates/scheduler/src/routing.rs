//! Handler routing - Binds wiring rules to handlers on the bus
//!
//! Handlers are registered once at bootstrap under `(component, handler)`.
//! Binding a rule subscribes the target's handler to the rule's source event;
//! nothing is looked up by name at dispatch time.

use bus::{Event, EventBus, HandlerFn, SubscriptionScope};
use shared::{ComponentId, SubscriptionId, TickwireError, UnboundHandlerError, WiringRule};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

struct RegisteredHandler<P> {
    handler: HandlerFn<P>,
    is_critical: bool,
}

/// Handlers by `(component_id, handler_name)`
pub struct HandlerTable<P> {
    handlers: BTreeMap<(ComponentId, String), RegisteredHandler<P>>,
}

impl<P> HandlerTable<P>
where
    P: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler, replacing any earlier one under the same name
    pub fn register<F>(
        &mut self,
        component_id: impl Into<ComponentId>,
        handler_name: impl Into<String>,
        handler: F,
        is_critical: bool,
    ) where
        F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(
            (component_id.into(), handler_name.into()),
            RegisteredHandler {
                handler: Arc::new(handler),
                is_critical,
            },
        );
    }

    /// Builder: register a handler
    pub fn with_handler<F>(
        mut self,
        component_id: impl Into<ComponentId>,
        handler_name: impl Into<String>,
        handler: F,
        is_critical: bool,
    ) -> Self
    where
        F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(component_id, handler_name, handler, is_critical);
        self
    }

    pub fn contains(&self, component_id: &ComponentId, handler_name: &str) -> bool {
        self.handlers
            .contains_key(&(component_id.clone(), handler_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn lookup(&self, rule: &WiringRule) -> Result<&RegisteredHandler<P>, UnboundHandlerError> {
        self.handlers
            .get(&(
                rule.target_component_id.clone(),
                rule.target_handler_name.clone(),
            ))
            .ok_or_else(|| UnboundHandlerError {
                component_id: rule.target_component_id.clone(),
                handler_name: rule.target_handler_name.clone(),
            })
    }
}

impl<P> Default for HandlerTable<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for HandlerTable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .handlers
            .keys()
            .map(|(component, handler)| format!("{}.{}", component, handler))
            .collect();
        f.debug_struct("HandlerTable").field("handlers", &names).finish()
    }
}

/// Subscribe the target handler of every rule to its source event
///
/// All-or-nothing: every rule is resolved before anything is subscribed, and
/// a failing subscription rolls back the ones made before it. The returned
/// ids are in rule order.
pub fn bind_rules<P>(
    bus: &EventBus<P>,
    rules: &[WiringRule],
    table: &HandlerTable<P>,
    scope: SubscriptionScope,
) -> Result<Vec<SubscriptionId>, TickwireError>
where
    P: Send + Sync + 'static,
{
    scope.validate()?;

    let resolved = rules
        .iter()
        .map(|rule| table.lookup(rule).map(|handler| (rule, handler)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ids = Vec::with_capacity(resolved.len());
    for (rule, registered) in resolved {
        let subscribed = bus.subscribe_handler(
            rule.source_event_name.clone(),
            Arc::clone(&registered.handler),
            scope.clone(),
            registered.is_critical,
        );
        match subscribed {
            Ok(id) => {
                debug!(rule = %rule, subscription = %id, "Rule bound");
                ids.push(id);
            }
            Err(err) => {
                unbind(bus, &ids);
                return Err(err.into());
            }
        }
    }

    info!(rules = ids.len(), scope = %scope, "Wiring rules bound");
    Ok(ids)
}

/// Remove subscriptions made by [`bind_rules`]; unknown ids are ignored
pub fn unbind<P>(bus: &EventBus<P>, ids: &[SubscriptionId])
where
    P: Send + Sync + 'static,
{
    for id in ids {
        bus.unsubscribe(*id);
    }
}
