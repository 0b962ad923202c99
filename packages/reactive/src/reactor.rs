//! # Reactor
//!
//! Single-threaded effect scheduler backing every reactive [`Store`](crate::Store).
//!
//! An effect is a closure that is run immediately on creation while the
//! reactor records which `(store, key)` pairs it reads. A write to any of
//! those pairs queues the effect; queued effects are flushed in creation
//! order (lowest [`EffectId`] first). Effects created by an ancestor are
//! therefore always re-run before effects created later by its descendants
//! within the same flush.
//!
//! Writes made while an effect is running, while a flush is in progress or
//! inside [`Reactor::batch`] only enqueue; the outermost caller flushes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::{Rc, Weak};
use tracing::{error, trace};

pub const DEFAULT_MAX_FLUSH_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What part of a store an effect depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A single named field
    Field(String),
    /// The key set / length (and, for arrays, any element)
    Shape,
}

type Dependency = (StoreId, DepKey);

struct EffectEntry {
    run: Rc<dyn Fn()>,
    deps: HashSet<Dependency>,
}

struct ReactorInner {
    next_effect: u64,
    next_store: u64,
    effects: BTreeMap<EffectId, EffectEntry>,
    subscribers: HashMap<Dependency, BTreeSet<EffectId>>,
    /// `Some(id)` while an effect runs, `None` for untracked sections
    tracking: Vec<Option<EffectId>>,
    pending: BTreeSet<EffectId>,
    flushing: bool,
    batch_depth: usize,
    max_flush_iterations: usize,
}

impl ReactorInner {
    fn unsubscribe(&mut self, id: EffectId, deps: HashSet<Dependency>) {
        for dep in deps {
            if let Some(subs) = self.subscribers.get_mut(&dep) {
                subs.remove(&id);
                if subs.is_empty() {
                    self.subscribers.remove(&dep);
                }
            }
        }
    }

    fn idle(&self) -> bool {
        !self.flushing && self.batch_depth == 0 && self.tracking.is_empty()
    }
}

/// Handle to a shared effect scheduler
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<RefCell<ReactorInner>>,
}

/// Non-owning reactor handle held by stores
#[derive(Clone)]
pub struct WeakReactor {
    inner: Weak<RefCell<ReactorInner>>,
}

impl WeakReactor {
    pub fn upgrade(&self) -> Option<Reactor> {
        self.inner.upgrade().map(|inner| Reactor { inner })
    }
}

impl Reactor {
    pub fn new() -> Self {
        Self::with_max_flush_iterations(DEFAULT_MAX_FLUSH_ITERATIONS)
    }

    pub fn with_max_flush_iterations(max_flush_iterations: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ReactorInner {
                next_effect: 0,
                next_store: 0,
                effects: BTreeMap::new(),
                subscribers: HashMap::new(),
                tracking: Vec::new(),
                pending: BTreeSet::new(),
                flushing: false,
                batch_depth: 0,
                max_flush_iterations,
            })),
        }
    }

    pub fn downgrade(&self) -> WeakReactor {
        WeakReactor {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn next_store_id(&self) -> StoreId {
        let mut inner = self.inner.borrow_mut();
        inner.next_store += 1;
        StoreId(inner.next_store)
    }

    /// Create an effect and run it once immediately
    pub fn effect(&self, f: impl Fn() + 'static) -> EffectId {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_effect += 1;
            let id = EffectId(inner.next_effect);
            inner.effects.insert(
                id,
                EffectEntry {
                    run: Rc::new(f),
                    deps: HashSet::new(),
                },
            );
            id
        };

        trace!(effect = ?id, "Effect created");
        self.run_effect(id);
        self.flush_if_idle();
        id
    }

    fn run_effect(&self, id: EffectId) {
        let run = {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.effects.get_mut(&id) else {
                return;
            };
            let deps = std::mem::take(&mut entry.deps);
            let run = entry.run.clone();
            inner.unsubscribe(id, deps);
            inner.tracking.push(Some(id));
            run
        };

        run();

        self.inner.borrow_mut().tracking.pop();
    }

    /// Record a read of `key` on `store` by the running effect, if any
    pub fn track(&self, store: StoreId, key: DepKey) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(Some(id)) = inner.tracking.last().copied() else {
            return;
        };
        let dep = (store, key);
        let Some(entry) = inner.effects.get_mut(&id) else {
            return;
        };
        if entry.deps.insert(dep.clone()) {
            inner.subscribers.entry(dep).or_default().insert(id);
        }
    }

    /// Queue every effect depending on `key` of `store`
    pub fn trigger(&self, store: StoreId, key: DepKey) {
        let should_flush = {
            let mut inner = self.inner.borrow_mut();
            let dep = (store, key);
            let Some(subs) = inner.subscribers.get(&dep) else {
                return;
            };
            let subs: Vec<EffectId> = subs.iter().copied().collect();
            inner.pending.extend(subs);
            inner.idle()
        };

        if should_flush {
            self.flush();
        }
    }

    /// Run queued effects until the queue drains
    pub fn flush(&self) {
        let max = {
            let mut inner = self.inner.borrow_mut();
            if inner.flushing {
                return;
            }
            inner.flushing = true;
            inner.max_flush_iterations
        };

        let mut iterations = 0usize;
        loop {
            let next = self.inner.borrow_mut().pending.pop_first();
            let Some(id) = next else {
                break;
            };

            iterations += 1;
            if iterations > max {
                let mut inner = self.inner.borrow_mut();
                error!(
                    max_flush_iterations = max,
                    pending = inner.pending.len(),
                    "Reactive flush exceeded iteration limit, dropping pending effects"
                );
                inner.pending.clear();
                break;
            }

            self.run_effect(id);
        }

        self.inner.borrow_mut().flushing = false;
    }

    fn flush_if_idle(&self) {
        let idle = {
            let inner = self.inner.borrow();
            inner.idle() && !inner.pending.is_empty()
        };
        if idle {
            self.flush();
        }
    }

    /// Defer flushing until `f` returns
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.borrow_mut().batch_depth += 1;
        let result = f();
        self.inner.borrow_mut().batch_depth -= 1;
        self.flush_if_idle();
        result
    }

    /// Run `f` without registering dependencies on the running effect
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.borrow_mut().tracking.push(None);
        let result = f();
        self.inner.borrow_mut().tracking.pop();
        result
    }

    /// Remove an effect and all of its subscriptions
    pub fn dispose(&self, id: EffectId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(entry) = inner.effects.remove(&id) {
            inner.unsubscribe(id, entry.deps);
            inner.pending.remove(&id);
            trace!(effect = ?id, "Effect disposed");
        }
    }

    pub fn is_active(&self, id: EffectId) -> bool {
        self.inner.borrow().effects.contains_key(&id)
    }

    /// Number of live effects
    pub fn effect_count(&self) -> usize {
        self.inner.borrow().effects.len()
    }

    /// Number of effects subscribed to `key` of `store`
    pub fn subscriber_count(&self, store: StoreId, key: &DepKey) -> usize {
        self.inner
            .borrow()
            .subscribers
            .get(&(store, key.clone()))
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}
