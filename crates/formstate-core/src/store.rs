//! The committed form state and the subscriptions watching it.
//!
//! Each subscription projects the state through a selector and keeps the
//! last projected value. After every committed transition all selectors are
//! evaluated in subscription order against the same state; listeners whose
//! projection changed then run, outside every internal borrow. A transition
//! dispatched from inside a listener is committed at once and gets its own
//! pass when the current one ends.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

use crate::state::{FormAction, FormState, reduce};

new_key_type! {
    struct SubscriptionKey;
}

type Notify = Box<dyn FnOnce()>;

/// Evaluates one selector; returns the listener call when the projection
/// changed.
type Probe = Box<dyn FnMut(&FormState) -> Option<Notify>>;

struct StoreInner {
    state: RefCell<FormState>,
    // A probe is `None` while it is being evaluated.
    probes: RefCell<SlotMap<SubscriptionKey, Option<Probe>>>,
    order: RefCell<Vec<SubscriptionKey>>,
    notifying: Cell<bool>,
    pending: Cell<bool>,
}

impl StoreInner {
    fn remove(&self, key: SubscriptionKey) -> bool {
        let removed = self.probes.borrow_mut().remove(key).is_some();
        if removed {
            self.order.borrow_mut().retain(|k| *k != key);
        }
        removed
    }
}

/// Clears the notifying flag even if a listener panics.
struct PassGuard<'a>(&'a Cell<bool>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn new(state: FormState) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(state),
                probes: RefCell::new(SlotMap::with_key()),
                order: RefCell::new(Vec::new()),
                notifying: Cell::new(false),
                pending: Cell::new(false),
            }),
        }
    }

    pub fn state(&self) -> FormState {
        self.inner.state.borrow().clone()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&FormState) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Commits one transition and notifies subscribers.
    pub fn dispatch(&self, action: FormAction) {
        let next = reduce(&self.inner.state.borrow(), action);
        *self.inner.state.borrow_mut() = next;
        self.notify();
    }

    fn notify(&self) {
        if self.inner.notifying.get() {
            self.inner.pending.set(true);
            return;
        }
        self.inner.notifying.set(true);
        let _pass = PassGuard(&self.inner.notifying);

        loop {
            self.inner.pending.set(false);
            let state = self.state();
            let keys = self.inner.order.borrow().clone();

            let mut listeners = Vec::new();
            for key in keys {
                let taken = self
                    .inner
                    .probes
                    .borrow_mut()
                    .get_mut(key)
                    .and_then(Option::take);
                let Some(mut probe) = taken else {
                    continue;
                };
                if let Some(call) = probe(&state) {
                    listeners.push((key, call));
                }
                if let Some(slot) = self.inner.probes.borrow_mut().get_mut(key) {
                    *slot = Some(probe);
                }
            }
            for (key, listener) in listeners {
                // an earlier listener may have dropped this subscription
                if self.inner.probes.borrow().contains_key(key) {
                    listener();
                }
            }

            if !self.inner.pending.get() {
                break;
            }
        }
    }

    /// Watches `selector(state)`. `listener` runs whenever `same(new, last)`
    /// is false after a transition, and once right away when
    /// `initial_notify` is set.
    pub fn subscribe<T, S, C, L>(
        &self,
        selector: S,
        same: C,
        initial_notify: bool,
        listener: L,
    ) -> Subscription
    where
        T: Clone + 'static,
        S: Fn(&FormState) -> T + 'static,
        C: Fn(&T, &T) -> bool + 'static,
        L: FnMut(&T) + 'static,
    {
        let current = self.with_state(&selector);
        let listener = Rc::new(RefCell::new(listener));

        let mut last = current.clone();
        let notify = listener.clone();
        let probe: Probe = Box::new(move |state: &FormState| -> Option<Notify> {
            let next = selector(state);
            if same(&next, &last) {
                return None;
            }
            last = next.clone();
            let notify = notify.clone();
            let call: Notify = Box::new(move || (&mut *notify.borrow_mut())(&next));
            Some(call)
        });

        let key = self.inner.probes.borrow_mut().insert(Some(probe));
        self.inner.order.borrow_mut().push(key);

        if initial_notify {
            (&mut *listener.borrow_mut())(&current);
        }

        Subscription {
            store: Rc::downgrade(&self.inner),
            key,
        }
    }

    /// Reads `selector(state)` and, when `should_subscribe` is set, keeps the
    /// result live.
    pub fn select<T, S, C>(&self, selector: S, same: C, should_subscribe: bool) -> Selected<T>
    where
        T: Clone + 'static,
        S: Fn(&FormState) -> T + 'static,
        C: Fn(&T, &T) -> bool + 'static,
    {
        let value = Rc::new(RefCell::new(self.with_state(&selector)));
        let changed = Rc::new(Cell::new(false));
        let subscription = should_subscribe.then(|| {
            let value = value.clone();
            let changed = changed.clone();
            self.subscribe(selector, same, false, move |next: &T| {
                *value.borrow_mut() = next.clone();
                changed.set(true);
            })
        });
        Selected {
            value,
            changed,
            subscription,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.order.borrow().len()
    }
}

/// Keeps a subscription alive; dropping it unsubscribes.
pub struct Subscription {
    store: Weak<StoreInner>,
    key: SubscriptionKey,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|inner| inner.probes.borrow().contains_key(self.key))
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.remove(self.key);
        }
    }
}

/// A live projection of the form state.
pub struct Selected<T> {
    value: Rc<RefCell<T>>,
    changed: Rc<Cell<bool>>,
    subscription: Option<Subscription>,
}

impl<T: Clone> Selected<T> {
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// True once after each change; the host re-renders on it.
    pub fn take_changed(&self) -> bool {
        self.changed.replace(false)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::value::Value;

    fn set(store: &Store, path: &str, value: impl Into<Value>) {
        store.dispatch(FormAction::SetFieldValue {
            path: Path::parse(path).unwrap(),
            value: Some(value.into()),
        });
    }

    fn name_of(state: &FormState) -> Value {
        state.values.lookup("name").cloned().unwrap_or_default()
    }

    #[test]
    fn test_notifies_only_when_projection_changes() {
        let store = Store::new(FormState::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _sub = store.subscribe(name_of, Value::eq, false, move |v: &Value| {
            log.borrow_mut().push(v.clone())
        });

        set(&store, "name", "ian");
        set(&store, "name", "ian");
        set(&store, "email", "x@y.z");
        set(&store, "name", "jared");

        assert_eq!(*seen.borrow(), vec![Value::from("ian"), Value::from("jared")]);
    }

    #[test]
    fn test_listeners_run_in_subscription_order_after_commit() {
        let store = Store::new(FormState::default());
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut subs = Vec::new();
        for id in 0..3 {
            let order = order.clone();
            let probe_store = store.clone();
            subs.push(store.subscribe(name_of, Value::eq, false, move |v: &Value| {
                // Every listener sees the fully committed state.
                assert_eq!(name_of(&probe_store.state()), *v);
                order.borrow_mut().push(id);
            }));
        }
        set(&store, "name", "a");
        assert_eq!(*order.borrow(), [0, 1, 2]);
    }

    #[test]
    fn test_dispatch_from_listener_gets_its_own_pass() {
        let store = Store::new(FormState::default());
        let inner = store.clone();
        let _echo = store.subscribe(name_of, Value::eq, false, move |v: &Value| {
            if v.as_str() == Some("ping") {
                set(&inner, "reply", "pong");
            }
        });
        let replies = Rc::new(Cell::new(0));
        let count = replies.clone();
        let _reply = store.subscribe(
            |s: &FormState| s.values.lookup("reply").cloned(),
            |a: &Option<Value>, b: &Option<Value>| a == b,
            false,
            move |_: &Option<Value>| count.set(count.get() + 1),
        );

        set(&store, "name", "ping");
        assert_eq!(store.state().values.lookup("reply"), Some(&Value::from("pong")));
        assert_eq!(replies.get(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let store = Store::new(FormState::default());
        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        let sub = store.subscribe(name_of, Value::eq, true, move |_: &Value| {
            count.set(count.get() + 1)
        });
        assert_eq!(hits.get(), 1);
        assert!(sub.is_active());

        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        set(&store, "name", "x");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_listener_dropping_a_later_subscription_silences_it() {
        let store = Store::new(FormState::default());
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot = later.clone();
        let _first = store.subscribe(name_of, Value::eq, false, move |_: &Value| {
            slot.borrow_mut().take();
        });

        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        *later.borrow_mut() = Some(store.subscribe(name_of, Value::eq, false, move |_: &Value| {
            count.set(count.get() + 1)
        }));

        set(&store, "name", "x");
        assert_eq!(hits.get(), 0);
        assert!(later.borrow().is_none());
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn test_select_without_subscription_is_a_snapshot() {
        let store = Store::new(FormState::default());
        let live = store.select(|s: &FormState| s.submit_count, u32::eq, true);
        let fixed = store.select(|s: &FormState| s.submit_count, u32::eq, false);

        store.dispatch(FormAction::SubmitAttempt {
            token: crate::state::RunToken(1),
            touched: Value::map(),
        });

        assert_eq!(live.get(), 1);
        assert!(live.take_changed());
        assert!(!live.take_changed());
        assert_eq!(fixed.get(), 0);
        assert!(!fixed.is_subscribed());
    }
}
