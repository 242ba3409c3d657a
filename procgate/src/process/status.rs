//! Exit status of a reaped child.

use std::fmt;

use serde::Serialize;

use crate::native::STATUS_UNAVAILABLE;

/// How a child process ended, as reported by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ExitStatus {
    /// The process exited with this code.
    Code(i32),
    /// The native layer could not determine the status.
    Unknown,
}

impl ExitStatus {
    /// Interpret a raw code from [`NativeProcess::wait`](crate::native::NativeProcess::wait).
    pub const fn from_raw(raw: i32) -> Self {
        if raw == STATUS_UNAVAILABLE {
            Self::Unknown
        } else {
            Self::Code(raw)
        }
    }

    /// The exit code, if known.
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Code(code) => Some(code),
            Self::Unknown => None,
        }
    }

    /// Whether the process exited with code zero.
    pub const fn success(self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
