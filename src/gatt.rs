//! Remote GATT characteristics ([Vol 3] Part G) exposed by BlueZ.

pub use {caps::*, characteristic::*, consts::*, notify::*};

pub mod codec;

mod caps;
mod characteristic;
mod consts;
mod notify;


/// BlueZ GATT characteristic interface.
pub const GATT_CHAR_IFACE: &str = "org.bluez.GattCharacteristic1";
