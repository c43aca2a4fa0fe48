//! Message bus boundary.
//!
//! The characteristic never talks to a socket directly. It issues method calls
//! and registers signal handlers through a [`Bus`] implementation supplied by
//! the owning device, which is expected to dispatch replies and signals on a
//! single event loop.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use zvariant::{OwnedValue, Value};

use crate::util::name_of;

#[cfg(test)]
pub(crate) mod fake;

/// BlueZ service name.
pub const BLUEZ: &str = "org.bluez";
/// Standard properties interface.
pub const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";
/// Signal emitted by [`PROPERTIES_IFACE`] when object properties change.
pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";

/// Remote method call or transport failure.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{name} (error {code}: {message})")]
pub struct Error {
    /// Error name, such as `org.bluez.Error.NotPermitted`.
    pub name: String,
    /// Transport-specific error code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

impl Error {
    /// Creates a new bus error.
    #[inline]
    pub fn new(name: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code,
            message: message.into(),
        }
    }
}

/// Common bus result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Property dictionary signature.
pub const PROP_MAP: &str = "a{sv}";

/// Returns the signature of a message body as a single structure, such as
/// `(aya{sv})` for `WriteValue` arguments.
#[must_use]
pub fn body_signature(args: &[OwnedValue]) -> String {
    let mut s = String::from("(");
    for v in args {
        s.push_str(v.value_signature().as_str());
    }
    s.push(')');
    s
}

/// Returns the value with any variant wrappers removed.
#[must_use]
pub fn unwrap_variant<'a, 'v>(mut v: &'a Value<'v>) -> &'a Value<'v> {
    while let Value::Value(ref inner) = *v {
        v = &**inner;
    }
    v
}

/// Builds an `a{sv}` method options dictionary.
#[must_use]
pub fn options<const N: usize>(kv: [(&'static str, Value<'static>); N]) -> OwnedValue {
    Value::from(HashMap::from(kv)).into()
}

/// Converts an `a{sv}` dictionary into a property map.
///
/// # Panics
///
/// If `v` is not an `a{sv}` dictionary.
#[must_use]
pub fn prop_map(v: &Value<'_>) -> HashMap<String, OwnedValue> {
    let v = unwrap_variant(v);
    let sig = v.value_signature();
    assert_eq!(sig.as_str(), PROP_MAP, "expected property dictionary, got {sig}");
    let Value::Dict(ref d) = *v else {
        unreachable!()
    };
    HashMap::try_from(d.clone()).unwrap_or_else(|e| panic!("invalid property dictionary ({e})"))
}

/// Asynchronous method call parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    pub dest: &'static str,
    pub path: String,
    pub iface: &'static str,
    pub method: &'static str,
    /// Input arguments.
    pub args: Vec<OwnedValue>,
    /// Expected reply signature or [`None`] if the reply is not checked.
    pub reply: Option<&'static str>,
    /// Call timeout or [`None`] for the transport default.
    pub timeout: Option<Duration>,
}

/// Signal subscription filter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignalMatch {
    pub sender: &'static str,
    pub iface: &'static str,
    pub member: &'static str,
    pub path: String,
    /// First string argument filter (`arg0`).
    pub arg0: Option<&'static str>,
}

/// Signal delivered to a subscription handler.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub sender: String,
    pub path: String,
    pub iface: String,
    pub member: String,
    pub args: Vec<OwnedValue>,
}

/// Bus-assigned signal subscription identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct SubscriptionId(pub u32);

/// Signal handler callback.
#[derive(Clone)]
#[repr(transparent)]
pub struct SignalHandler(Arc<dyn Fn(&Signal) + Send + Sync>);

impl SignalHandler {
    /// Invokes the handler.
    #[inline(always)]
    pub fn call(&self, sig: &Signal) {
        (self.0)(sig);
    }
}

impl Debug for SignalHandler {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(SignalHandler)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

impl<T: Fn(&Signal) + Send + Sync + 'static> From<T> for SignalHandler {
    #[inline(always)]
    fn from(f: T) -> Self {
        Self(Arc::new(f))
    }
}

/// Connection to a message bus.
pub trait Bus: Clone + Debug + Send + Sync + 'static {
    /// Pending method call. Resolves exactly once with the reply arguments or
    /// the call error. Dropping the future does not cancel the remote call.
    type Call: Future<Output = Result<Vec<OwnedValue>>> + Send + 'static;

    /// Issues an asynchronous method call.
    fn call(&self, c: MethodCall) -> Self::Call;

    /// Registers a signal handler. Registration cannot fail. The handler may
    /// be invoked before this method returns.
    fn subscribe(&self, m: SignalMatch, f: SignalHandler) -> SubscriptionId;

    /// Removes a signal handler registered by [`Bus::subscribe`].
    fn unsubscribe(&self, id: SubscriptionId);
}
