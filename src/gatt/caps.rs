use std::fmt::{Display, Formatter};

use super::*;

/// Characteristic capabilities: the raw `Flags` tokens as reported by the
/// peer together with the property bits derived from them. The two are only
/// ever replaced together.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Caps {
    flags: Vec<String>,
    props: CharProps,
}

impl Caps {
    /// Creates capabilities from reported `Flags` tokens, keeping the tokens
    /// verbatim. Unknown tokens contribute no property bits.
    pub fn from_flags<S: Into<String>>(flags: impl IntoIterator<Item = S>) -> Self {
        let flags: Vec<String> = flags.into_iter().map(Into::into).collect();
        let props = CharProps::from_flags(&flags);
        Self { flags, props }
    }

    /// Creates capabilities from known property bits. The token list is
    /// regenerated from the bits.
    #[must_use]
    pub fn from_props(props: CharProps) -> Self {
        let flags = props.flags().iter().map(ToString::to_string).collect();
        Self { flags, props }
    }

    /// Returns the capability tokens.
    #[inline(always)]
    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Returns the property bits.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> CharProps {
        self.props
    }
}

impl From<CharProps> for Caps {
    #[inline]
    fn from(p: CharProps) -> Self {
        Self::from_props(p)
    }
}

impl Display for Caps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.flags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(s)?;
        }
        f.write_str("]")
    }
}
