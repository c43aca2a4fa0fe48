use bitflags::bitflags;
use enum_iterator::{all, Sequence};

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct CharProps: u8 {
        /// Permits broadcasts of the Characteristic Value using Server
        /// Characteristic Configuration Descriptor.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permit writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        /// Additional characteristic properties are defined in the
        /// Characteristic Extended Properties Descriptor.
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharProps {
    /// Converts BlueZ `Flags` tokens into properties. Unknown tokens are
    /// ignored.
    pub fn from_flags<S: AsRef<str>>(flags: impl IntoIterator<Item = S>) -> Self {
        (flags.into_iter())
            .filter_map(|s| s.as_ref().parse::<Flag>().ok())
            .fold(Self::empty(), |p, f| p | f.prop())
    }

    /// Returns the canonical tokens for the set bits, in bit order.
    #[must_use]
    pub fn flags(self) -> Vec<Flag> {
        all::<Flag>().filter(|f| self.contains(f.prop())).collect()
    }

    /// Returns whether the characteristic value can be read.
    #[inline]
    #[must_use]
    pub const fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    /// Returns whether the characteristic value can be written with the
    /// specified procedure.
    #[inline]
    #[must_use]
    pub const fn can_write(self, typ: WriteType) -> bool {
        match typ {
            WriteType::WithResponse => self.contains(Self::WRITE),
            WriteType::WithoutResponse => self.contains(Self::WRITE_WITHOUT_RESPONSE),
        }
    }

    /// Returns whether the characteristic supports notifications or
    /// indications.
    #[inline]
    #[must_use]
    pub const fn can_notify(self) -> bool {
        self.intersects(Self::NOTIFY.union(Self::INDICATE))
    }
}

/// Characteristic capability tokens reported in the BlueZ `Flags` property.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Sequence,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum Flag {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    Notify,
    Indicate,
    AuthenticatedSignedWrites,
}

impl Flag {
    /// Returns the property bit of the token.
    #[inline]
    #[must_use]
    pub const fn prop(self) -> CharProps {
        match self {
            Self::Broadcast => CharProps::BROADCAST,
            Self::Read => CharProps::READ,
            Self::WriteWithoutResponse => CharProps::WRITE_WITHOUT_RESPONSE,
            Self::Write => CharProps::WRITE,
            Self::Notify => CharProps::NOTIFY,
            Self::Indicate => CharProps::INDICATE,
            Self::AuthenticatedSignedWrites => CharProps::AUTHENTICATED_SIGNED_WRITES,
        }
    }
}

/// Characteristic value write procedure.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::AsRefStr, strum::Display)]
pub enum WriteType {
    /// Write request, acknowledged by the peer (`type` = `"request"`).
    #[default]
    #[strum(serialize = "request")]
    WithResponse,
    /// Write command, not acknowledged (`type` = `"command"`).
    #[strum(serialize = "command")]
    WithoutResponse,
}
