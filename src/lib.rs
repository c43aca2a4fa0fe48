//! Remote GATT characteristic client for the [BlueZ] object model.
//!
//! A [`gatt::Characteristic`] mirrors one `org.bluez.GattCharacteristic1`
//! object and drives its `ReadValue`, `WriteValue`, `StartNotify`, and
//! `StopNotify` methods over an abstract message [`bus::Bus`]. Outcomes are
//! delivered through per-characteristic callbacks on the Tokio runtime that
//! issued the operation.
//!
//! [BlueZ]: https://git.kernel.org/pub/scm/bluetooth/bluez.git/tree/doc

pub mod bus;
pub mod dev;
pub mod gatt;

mod util;
