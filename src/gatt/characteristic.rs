use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zvariant::{OwnedValue, Value};

use crate::bus::{self, Bus, MethodCall, SubscriptionId, BLUEZ};
use crate::dev::Device;
use crate::util::Hex;

use super::*;

const READ_VALUE: &str = "ReadValue";
const WRITE_VALUE: &str = "WriteValue";

/// Read completion callback.
pub type ReadFn<B> = Arc<dyn Fn(&Characteristic<B>, bus::Result<Vec<u8>>) + Send + Sync>;
/// Write completion callback.
pub type WriteFn<B> = Arc<dyn Fn(&Characteristic<B>, bus::Result<()>) + Send + Sync>;
/// Value notification callback.
pub type NotifyFn<B> = Arc<dyn Fn(&Characteristic<B>, &[u8]) + Send + Sync>;
/// Notifying state change or `StartNotify`/`StopNotify` failure callback.
pub type NotifyingFn<B> = Arc<dyn Fn(&Characteristic<B>, bus::Result<()>) + Send + Sync>;

/// Characteristic configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// Method call timeout. [`None`] uses the bus default.
    pub timeout: Option<Duration>,
    /// Remove the property change subscription when `StartNotify` fails. By
    /// default the subscription stays registered until a `Notifying = false`
    /// change or until the characteristic is dropped.
    pub release_on_start_failure: bool,
}

/// Remote GATT characteristic (`org.bluez.GattCharacteristic1`).
///
/// This is a shared handle. Clones refer to the same characteristic, which is
/// destroyed when the last handle is dropped and no operations are pending.
/// All operations must be issued from within a Tokio runtime. Completion
/// callbacks run on that runtime, one at a time, with no internal lock held.
pub struct Characteristic<B: Bus> {
    pub(super) inner: Arc<Inner<B>>,
}

pub(super) struct Inner<B: Bus> {
    pub(super) bus: B,
    dev: Weak<dyn Device<Bus = B>>,
    pub(super) path: String,
    pub(super) opts: Options,
    pub(super) st: Mutex<State<B>>,
}

pub(super) struct State<B: Bus> {
    uuid: String,
    service_uuid: String,
    service_path: String,
    caps: Caps,
    pub(super) notifying: bool,
    pub(super) notify_state: NotifyState,
    pub(super) sub: Option<SubscriptionId>,
    on_read: Option<ReadFn<B>>,
    on_write: Option<WriteFn<B>>,
    pub(super) on_notify: Option<NotifyFn<B>>,
    pub(super) on_notifying: Option<NotifyingFn<B>>,
}

impl<B: Bus> Characteristic<B> {
    /// Creates a characteristic for the object at `path`, using the bus
    /// connection of `dev`.
    #[inline]
    pub fn new<D: Device<Bus = B>>(dev: &Arc<D>, path: impl Into<String>) -> Self {
        Self::with_options(dev, path, Options::default())
    }

    /// Creates a characteristic with non-default options.
    pub fn with_options<D: Device<Bus = B>>(
        dev: &Arc<D>,
        path: impl Into<String>,
        opts: Options,
    ) -> Self {
        let bus = dev.connection();
        let dev: Weak<D> = Arc::downgrade(dev);
        let dev: Weak<dyn Device<Bus = B>> = dev;
        Self {
            inner: Arc::new(Inner {
                bus,
                dev,
                path: path.into(),
                opts,
                st: Mutex::new(State {
                    uuid: String::new(),
                    service_uuid: String::new(),
                    service_path: String::new(),
                    caps: Caps::default(),
                    notifying: false,
                    notify_state: NotifyState::Idle,
                    sub: None,
                    on_read: None,
                    on_write: None,
                    on_notify: None,
                    on_notifying: None,
                }),
            }),
        }
    }

    /// Returns the owning device or [`None`] if it no longer exists.
    #[inline]
    #[must_use]
    pub fn device(&self) -> Option<Arc<dyn Device<Bus = B>>> {
        self.inner.dev.upgrade()
    }

    /// Returns the object path.
    #[inline(always)]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    #[must_use]
    pub fn uuid(&self) -> String {
        self.inner.st.lock().uuid.clone()
    }

    pub fn set_uuid(&self, uuid: impl Into<String>) {
        self.inner.st.lock().uuid = uuid.into();
    }

    #[must_use]
    pub fn service_uuid(&self) -> String {
        self.inner.st.lock().service_uuid.clone()
    }

    pub fn set_service_uuid(&self, uuid: impl Into<String>) {
        self.inner.st.lock().service_uuid = uuid.into();
    }

    #[must_use]
    pub fn service_path(&self) -> String {
        self.inner.st.lock().service_path.clone()
    }

    pub fn set_service_path(&self, path: impl Into<String>) {
        self.inner.st.lock().service_path = path.into();
    }

    /// Returns the capabilities.
    #[must_use]
    pub fn caps(&self) -> Caps {
        self.inner.st.lock().caps.clone()
    }

    /// Replaces the capabilities.
    pub fn set_caps(&self, caps: Caps) {
        self.inner.st.lock().caps = caps;
    }

    /// Returns the reported `Flags` tokens.
    #[must_use]
    pub fn flags(&self) -> Vec<String> {
        self.inner.st.lock().caps.flags().to_vec()
    }

    /// Replaces the capabilities with those described by BlueZ `Flags`
    /// tokens.
    #[inline]
    pub fn set_flags<S: Into<String>>(&self, flags: impl IntoIterator<Item = S>) {
        self.set_caps(Caps::from_flags(flags));
    }

    /// Returns the property bits.
    #[must_use]
    pub fn properties(&self) -> CharProps {
        self.inner.st.lock().caps.props()
    }

    /// Replaces the capabilities when only the property bits are known.
    #[inline]
    pub fn set_properties(&self, props: CharProps) {
        self.set_caps(Caps::from_props(props));
    }

    /// Returns the last known value of the remote `Notifying` property.
    #[must_use]
    pub fn is_notifying(&self) -> bool {
        self.inner.st.lock().notifying
    }

    /// Seeds the `Notifying` property from an initial property snapshot.
    pub fn set_notifying(&self, on: bool) {
        self.inner.st.lock().notifying = on;
    }

    #[must_use]
    pub fn supports_read(&self) -> bool {
        self.properties().can_read()
    }

    #[must_use]
    pub fn supports_write(&self, typ: WriteType) -> bool {
        self.properties().can_write(typ)
    }

    /// Returns whether the characteristic supports notifications or
    /// indications.
    #[must_use]
    pub fn supports_notify(&self) -> bool {
        self.properties().can_notify()
    }

    /// Sets the read completion callback, replacing any previous one.
    pub fn on_read(&self, f: impl Fn(&Self, bus::Result<Vec<u8>>) + Send + Sync + 'static) {
        self.inner.st.lock().on_read = Some(Arc::new(f));
    }

    /// Sets the write completion callback, replacing any previous one.
    pub fn on_write(&self, f: impl Fn(&Self, bus::Result<()>) + Send + Sync + 'static) {
        self.inner.st.lock().on_write = Some(Arc::new(f));
    }

    /// Sets the value notification callback, replacing any previous one.
    pub fn on_notify(&self, f: impl Fn(&Self, &[u8]) + Send + Sync + 'static) {
        self.inner.st.lock().on_notify = Some(Arc::new(f));
    }

    /// Sets the notifying state callback, replacing any previous one. It is
    /// called with `Ok` when the remote `Notifying` property changes and with
    /// the call error when `StartNotify` or `StopNotify` fails.
    pub fn on_notifying_changed(
        &self,
        f: impl Fn(&Self, bus::Result<()>) + Send + Sync + 'static,
    ) {
        self.inner.st.lock().on_notifying = Some(Arc::new(f));
    }

    /// Removes all callbacks.
    pub fn clear_callbacks(&self) {
        let mut st = self.inner.st.lock();
        st.on_read = None;
        st.on_write = None;
        st.on_notify = None;
        st.on_notifying = None;
    }

    /// Reads the characteristic value. The read callback is invoked exactly
    /// once with the value or the call error.
    ///
    /// # Panics
    ///
    /// If the characteristic does not support reads.
    pub fn read(&self) -> JoinHandle<()> {
        assert!(self.supports_read(), "{} does not support reads", self.path());
        debug!("reading <{}>", self.uuid());
        let opts = bus::options([("offset", Value::U16(0))]);
        let call = self.call(READ_VALUE, vec![opts], Some("(ay)"));
        let this = self.clone();
        tokio::spawn(async move {
            let r = call.await.map(|v| codec::decode_reply(&v));
            if let Err(ref e) = r {
                warn!("Failed to call '{READ_VALUE}' (error {}: {})", e.code, e.message);
            }
            if let Some(f) = this.with_state(|st| st.on_read.clone()) {
                f(&this, r);
            }
        })
    }

    /// Writes the characteristic value using the specified procedure. The
    /// write callback is invoked exactly once with the outcome.
    ///
    /// # Panics
    ///
    /// If the characteristic does not support the write type.
    pub fn write(&self, v: &[u8], typ: WriteType) -> JoinHandle<()> {
        assert!(
            self.supports_write(typ),
            "{} does not support {typ:?} writes",
            self.path()
        );
        debug!("writing <{}> to <{}>", Hex(v), self.uuid());
        let opts = bus::options([
            ("offset", Value::U16(0)),
            ("type", Value::from(typ.to_string())),
        ]);
        let call = self.call(WRITE_VALUE, vec![codec::encode(v).into(), opts], None);
        let this = self.clone();
        tokio::spawn(async move {
            let r = call.await.map(|_| ());
            if let Err(ref e) = r {
                warn!("Failed to call '{WRITE_VALUE}' (error {}: {})", e.code, e.message);
            }
            if let Some(f) = this.with_state(|st| st.on_write.clone()) {
                f(&this, r);
            }
        })
    }

    /// Issues a characteristic interface method call.
    pub(super) fn call(
        &self,
        method: &'static str,
        args: Vec<OwnedValue>,
        reply: Option<&'static str>,
    ) -> B::Call {
        self.inner.bus.call(MethodCall {
            dest: BLUEZ,
            path: self.inner.path.clone(),
            iface: GATT_CHAR_IFACE,
            method,
            args,
            reply,
            timeout: self.inner.opts.timeout,
        })
    }

    /// Calls `f` with the state lock held.
    #[inline]
    pub(super) fn with_state<T>(&self, f: impl FnOnce(&mut State<B>) -> T) -> T {
        f(&mut self.inner.st.lock())
    }
}

impl<B: Bus> Clone for Characteristic<B> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Bus> Debug for Characteristic<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.st.lock();
        (f.debug_struct("Characteristic"))
            .field("path", &self.inner.path)
            .field("uuid", &st.uuid)
            .field("props", &st.caps.props())
            .field("notifying", &st.notifying)
            .field("notify_state", &st.notify_state)
            .finish_non_exhaustive()
    }
}

impl<B: Bus> Display for Characteristic<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.st.lock();
        write!(
            f,
            "Characteristic{{uuid='{}', flags='{}', properties={}, service_uuid='{}'}}",
            st.uuid,
            st.caps,
            st.caps.props().bits(),
            st.service_uuid
        )
    }
}
