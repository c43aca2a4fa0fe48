//! Scripted in-memory bus for tests.

use std::collections::{BTreeMap, VecDeque};
use std::future::{ready, Ready};
use std::sync::Arc;

use parking_lot::Mutex;

use super::*;

#[derive(Debug, Default)]
struct State {
    calls: Vec<MethodCall>,
    replies: VecDeque<Result<Vec<OwnedValue>>>,
    subs: BTreeMap<SubscriptionId, (SignalMatch, SignalHandler)>,
    on_subscribe: VecDeque<Vec<OwnedValue>>,
    unsubscribed: Vec<SubscriptionId>,
    history: Vec<String>,
    next_id: u32,
}

/// Bus that records calls and subscriptions, answers calls from a reply queue,
/// and delivers signals on demand.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeBus(Arc<Mutex<State>>);

impl FakeBus {
    /// Queues the reply for the next method call. Calls without a queued reply
    /// succeed with no output arguments.
    pub fn reply(&self, r: Result<Vec<OwnedValue>>) {
        self.0.lock().replies.push_back(r);
    }

    /// Queues a `PropertiesChanged` signal that the next subscription handler
    /// receives from within [`Bus::subscribe`].
    pub fn emit_on_subscribe(&self, args: Vec<OwnedValue>) {
        self.0.lock().on_subscribe.push_back(args);
    }

    /// Returns all method calls issued so far.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.0.lock().calls.clone()
    }

    /// Returns active subscription filters.
    pub fn subs(&self) -> Vec<SignalMatch> {
        (self.0.lock().subs.values()).map(|(m, _)| m.clone()).collect()
    }

    /// Returns the identifiers passed to `unsubscribe`, in call order.
    pub fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.0.lock().unsubscribed.clone()
    }

    /// Returns the sequence of calls, subscriptions, and unsubscriptions.
    pub fn history(&self) -> Vec<String> {
        self.0.lock().history.clone()
    }

    /// Delivers a `PropertiesChanged` signal to all handlers subscribed to
    /// `path`. Handlers are invoked without holding the bus lock.
    pub fn emit(&self, path: &str, args: Vec<OwnedValue>) {
        let hs: Vec<SignalHandler> = (self.0.lock().subs.values())
            .filter(|(m, _)| m.path == path && m.member == PROPERTIES_CHANGED)
            .map(|(_, h)| h.clone())
            .collect();
        let sig = properties_changed(path, args);
        for h in hs {
            h.call(&sig);
        }
    }
}

fn properties_changed(path: &str, args: Vec<OwnedValue>) -> Signal {
    Signal {
        sender: BLUEZ.into(),
        path: path.into(),
        iface: PROPERTIES_IFACE.into(),
        member: PROPERTIES_CHANGED.into(),
        args,
    }
}

impl Bus for FakeBus {
    type Call = Ready<Result<Vec<OwnedValue>>>;

    fn call(&self, c: MethodCall) -> Self::Call {
        let mut s = self.0.lock();
        s.history.push(format!("call {}", c.method));
        s.calls.push(c);
        ready(s.replies.pop_front().unwrap_or_else(|| Ok(Vec::new())))
    }

    fn subscribe(&self, m: SignalMatch, f: SignalHandler) -> SubscriptionId {
        let mut s = self.0.lock();
        s.next_id += 1;
        let id = SubscriptionId(s.next_id);
        s.history.push(format!("subscribe {}", id.0));
        let early = s.on_subscribe.pop_front().map(|args| properties_changed(&m.path, args));
        s.subs.insert(id, (m, f.clone()));
        drop(s);
        if let Some(sig) = early {
            f.call(&sig);
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut s = self.0.lock();
        assert!(s.subs.remove(&id).is_some(), "unknown subscription {id:?}");
        s.history.push(format!("unsubscribe {}", id.0));
        s.unsubscribed.push(id);
    }
}
