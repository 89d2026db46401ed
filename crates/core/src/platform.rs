//! Target platforms for distributed artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported target operating system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Windows.
    Win32,
    /// macOS.
    Darwin,
    /// Linux.
    Linux,
}

impl Platform {
    /// Every supported platform, in release-table order.
    pub const ALL: [Platform; 3] = [Platform::Win32, Platform::Darwin, Platform::Linux];

    /// Parse from a platform identifier (`win32`, `darwin`, `linux`).
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "win32" => Ok(Self::Win32),
            "darwin" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            _ => Err(crate::Error::UnknownPlatform(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win32 => "win32",
            Self::Darwin => "darwin",
            Self::Linux => "linux",
        }
    }

    /// Infer the platform from a `User-Agent` header.
    ///
    /// Falls back to `win32` when nothing matches, which is what desktop
    /// updaters expect when they do not send a platform hint.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Windows") || user_agent.contains("win32") {
            Self::Win32
        } else if user_agent.contains("Mac") || user_agent.contains("darwin") {
            Self::Darwin
        } else if user_agent.contains("Linux") || user_agent.contains("linux") {
            Self::Linux
        } else {
            Self::Win32
        }
    }
}

impl FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
