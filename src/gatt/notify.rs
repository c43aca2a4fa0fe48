use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use zvariant::{OwnedValue, Value};

use crate::bus::{
    body_signature, prop_map, unwrap_variant, Bus, Signal, SignalHandler, SignalMatch,
    SubscriptionId, BLUEZ, PROPERTIES_CHANGED, PROPERTIES_IFACE,
};
use crate::util::Hex;

use super::characteristic::{Inner, State};
use super::*;

const START_NOTIFY: &str = "StartNotify";
const STOP_NOTIFY: &str = "StopNotify";
const NOTIFYING: &str = "Notifying";
const VALUE: &str = "Value";

/// `PropertiesChanged` signal signature: interface, changed properties, and
/// invalidated property names.
const PROPERTIES_CHANGED_SIG: &str = "(sa{sv}as)";

/// Notification subscription state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display)]
pub enum NotifyState {
    /// No `StartNotify` has been issued, or the remote side reported
    /// `Notifying = false`.
    #[default]
    Idle,
    /// `StartNotify` call is in flight.
    Starting,
    /// Remote side reported `Notifying = true`.
    Active,
    /// `StopNotify` call is in flight.
    Stopping,
}

impl<B: Bus> Characteristic<B> {
    /// Returns the notification subscription state.
    #[must_use]
    pub fn notify_state(&self) -> NotifyState {
        self.with_state(|st| st.notify_state)
    }

    /// Enables value notifications or indications.
    ///
    /// The property change subscription is registered before `StartNotify` is
    /// issued so that no early notification is missed. A successful call does
    /// not invoke any callback. The notifying state callback fires when the
    /// remote `Notifying` property changes, or with the error if the call
    /// fails. If notifications were already enabled, success moves the state
    /// straight to [`NotifyState::Active`].
    ///
    /// # Panics
    ///
    /// If the characteristic supports neither notifications nor indications.
    pub fn start_notify(&self) -> JoinHandle<()> {
        assert!(
            self.supports_notify(),
            "{} does not support notifications",
            self.path()
        );
        debug!("start notify for <{}>", self.uuid());
        let fresh = self.subscribe();
        self.with_state(|st| st.notify_state = NotifyState::Starting);
        let call = self.call(START_NOTIFY, Vec::new(), None);
        let this = self.clone();
        tokio::spawn(async move {
            let e = match call.await {
                Ok(_) => {
                    this.settle(NotifyState::Starting, true);
                    return;
                }
                Err(e) => e,
            };
            warn!("Failed to call '{START_NOTIFY}' (error {}: {})", e.code, e.message);
            this.with_state(|st| {
                if st.notify_state == NotifyState::Starting {
                    st.notify_state = st.settled();
                }
            });
            if let Some(id) = fresh.filter(|_| this.inner.opts.release_on_start_failure) {
                this.release(id);
            }
            this.notifying_changed(Err(e));
        })
    }

    /// Disables value notifications or indications. The subscription is
    /// removed once the remote side reports `Notifying = false`, or when the
    /// call succeeds while notifications are already disabled. The notifying
    /// state callback fires with the error if the call fails.
    ///
    /// # Panics
    ///
    /// If the characteristic supports neither notifications nor indications.
    pub fn stop_notify(&self) -> JoinHandle<()> {
        assert!(
            self.supports_notify(),
            "{} does not support notifications",
            self.path()
        );
        debug!("stop notify for <{}>", self.uuid());
        self.with_state(|st| st.notify_state = NotifyState::Stopping);
        let call = self.call(STOP_NOTIFY, Vec::new(), None);
        let this = self.clone();
        tokio::spawn(async move {
            let e = match call.await {
                Ok(_) => {
                    if this.settle(NotifyState::Stopping, false) {
                        this.unsubscribe();
                    }
                    return;
                }
                Err(e) => e,
            };
            warn!("Failed to call '{STOP_NOTIFY}' (error {}: {})", e.code, e.message);
            this.with_state(|st| {
                if st.notify_state == NotifyState::Stopping {
                    st.notify_state = st.settled();
                }
            });
            this.notifying_changed(Err(e));
        })
    }

    /// Handles the arguments of a `PropertiesChanged` signal.
    ///
    /// # Panics
    ///
    /// If the arguments or the known properties have unexpected types.
    pub(crate) fn properties_changed(&self, args: &[OwnedValue]) {
        let sig = body_signature(args);
        assert_eq!(sig, PROPERTIES_CHANGED_SIG, "unexpected signal signature");
        let Value::Str(ref iface) = *args[0] else {
            unreachable!()
        };
        if iface.as_str() != GATT_CHAR_IFACE {
            trace!("Ignoring property change for {iface}");
            return;
        }
        let changed = prop_map(&args[1]);
        if let Some(v) = changed.get(NOTIFYING) {
            let Value::Bool(on) = *unwrap_variant(v) else {
                panic!("invalid {NOTIFYING} value {v:?}")
            };
            self.with_state(|st| {
                st.notifying = on;
                st.notify_state = st.settled();
            });
            debug!("notifying {on} <{}>", self.uuid());
            if !on {
                self.unsubscribe();
            }
            self.notifying_changed(Ok(()));
        }
        if let Some(v) = changed.get(VALUE) {
            let b = codec::decode(v);
            debug!("notification <{}> on <{}>", Hex(&b), self.uuid());
            if let Some(cb) = self.with_state(|st| st.on_notify.clone()) {
                cb(self, &b);
            }
        }
    }

    /// Moves the state out of `pending` after a successful call if the last
    /// known `Notifying` value already equals `on`, since no property change
    /// will follow. Returns whether the state was settled.
    fn settle(&self, pending: NotifyState, on: bool) -> bool {
        self.with_state(|st| {
            let done = st.notify_state == pending && st.notifying == on;
            if done {
                st.notify_state = st.settled();
            }
            done
        })
    }

    /// Registers the property change handler unless it is already registered.
    /// Returns the new subscription identifier or [`None`] if an existing
    /// subscription was reused. The bus is called without the state lock held,
    /// so the handler may run before this method returns.
    fn subscribe(&self) -> Option<SubscriptionId> {
        if let Some(id) = self.with_state(|st| st.sub) {
            trace!("Reusing property change subscription {id:?}");
            return None;
        }
        let m = SignalMatch {
            sender: BLUEZ,
            iface: PROPERTIES_IFACE,
            member: PROPERTIES_CHANGED,
            path: self.inner.path.clone(),
            arg0: Some(GATT_CHAR_IFACE),
        };
        let id = (self.inner.bus).subscribe(m, Self::handler(Arc::downgrade(&self.inner)));
        let cur = self.with_state(|st| *st.sub.get_or_insert(id));
        if cur != id {
            trace!("Dropping redundant subscription {id:?} (using {cur:?})");
            self.inner.bus.unsubscribe(id);
            return None;
        }
        trace!("Subscribed to property changes of {} ({id:?})", self.inner.path);
        Some(id)
    }

    /// Removes the property change handler if it is registered.
    fn unsubscribe(&self) {
        let Some(id) = self.with_state(|st| st.sub.take()) else {
            return;
        };
        trace!("Unsubscribing from property changes of {} ({id:?})", self.inner.path);
        self.inner.bus.unsubscribe(id);
    }

    /// Removes the property change handler if `id` is still the registered
    /// subscription.
    fn release(&self, id: SubscriptionId) {
        let taken = self.with_state(|st| st.sub == Some(id) && st.sub.take().is_some());
        if taken {
            trace!("Unsubscribing from property changes of {} ({id:?})", self.inner.path);
            self.inner.bus.unsubscribe(id);
        }
    }

    /// Returns a signal handler that does not keep the characteristic alive.
    fn handler(w: Weak<Inner<B>>) -> SignalHandler {
        SignalHandler::from(move |sig: &Signal| {
            if let Some(inner) = w.upgrade() {
                Self { inner }.properties_changed(&sig.args);
            }
        })
    }

    /// Invokes the notifying state callback.
    fn notifying_changed(&self, r: crate::bus::Result<()>) {
        if let Some(f) = self.with_state(|st| st.on_notifying.clone()) {
            f(self, r);
        }
    }
}

impl<B: Bus> State<B> {
    /// Returns the state implied by the last known `Notifying` value.
    #[inline]
    fn settled(&self) -> NotifyState {
        if self.notifying {
            NotifyState::Active
        } else {
            NotifyState::Idle
        }
    }
}

impl<B: Bus> Drop for Inner<B> {
    fn drop(&mut self) {
        if let Some(id) = self.st.get_mut().sub.take() {
            trace!("Unsubscribing from property changes of {} ({id:?})", self.path);
            self.bus.unsubscribe(id);
        }
    }
}
