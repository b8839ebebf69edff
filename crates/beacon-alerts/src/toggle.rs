//! Tri-state configuration switch.

use serde::{Deserialize, Serialize};

/// A boolean setting that distinguishes "not configured" from an explicit value.
///
/// Deserializes from an optional boolean: a missing key or `null` is
/// [`Toggle::Unspecified`], which defers to the caller's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Toggle {
    /// Not set; the default applies.
    #[default]
    Unspecified,
    /// Explicitly on.
    Enabled,
    /// Explicitly off.
    Disabled,
}

impl Toggle {
    /// Resolves the toggle against a default.
    #[must_use]
    pub const fn resolve(self, default: bool) -> bool {
        match self {
            Self::Unspecified => default,
            Self::Enabled => true,
            Self::Disabled => false,
        }
    }

    /// Returns true unless explicitly disabled.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.resolve(true)
    }
}

impl From<Option<bool>> for Toggle {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::Unspecified,
            Some(true) => Self::Enabled,
            Some(false) => Self::Disabled,
        }
    }
}

impl From<Toggle> for Option<bool> {
    fn from(value: Toggle) -> Self {
        match value {
            Toggle::Unspecified => None,
            Toggle::Enabled => Some(true),
            Toggle::Disabled => Some(false),
        }
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}
