use std::sync::Arc;

use parking_lot::Mutex;

/// User interaction channels that count as "activity"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Click,
    Scroll,
    TouchStart,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Click,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(ActivityKind) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kinds: Vec<ActivityKind>,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Listener registry for user activity, the terminal's stand-in for window
/// event listeners. Clones share the registry.
#[derive(Clone, Default)]
pub struct ActivitySignals {
    registry: Arc<Mutex<Registry>>,
}

impl ActivitySignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, kinds: &[ActivityKind], handler: F) -> ListenerId
    where
        F: Fn(ActivityKind) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.listeners.push(Listener {
            id,
            kinds: kinds.to_vec(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Returns false if the listener was already removed
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|l| l.id != id);
        registry.listeners.len() != before
    }

    /// Deliver one event to every listener registered for its kind.
    /// Handlers run outside the registry lock, so they may add or remove
    /// listeners themselves.
    pub fn dispatch(&self, kind: ActivityKind) -> usize {
        let handlers: Vec<Handler> = self
            .registry
            .lock()
            .listeners
            .iter()
            .filter(|l| l.kinds.contains(&kind))
            .map(|l| Arc::clone(&l.handler))
            .collect();

        for handler in &handlers {
            handler(kind);
        }
        handlers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}
