use crate::bus::Bus;

/// Remote device that owns the bus connection used by its characteristics.
pub trait Device: Send + Sync + 'static {
    type Bus: Bus;

    /// Returns the device object path.
    fn path(&self) -> &str;

    /// Returns a handle to the bus connection of the device.
    fn connection(&self) -> Self::Bus;
}
