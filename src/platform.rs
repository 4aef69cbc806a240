//! Build platforms
//!
//! A platform is an `os/arch` pair as requested by the client. Distro
//! backends map the architecture identifier to their native arch naming;
//! the identifiers here are the request-side ones (`amd64`, `arm64`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PacksmithError, Result};

/// One requested build platform
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: &str, arch: &str) -> Self {
        Platform {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::new("linux", "amd64")
    }
}

impl FromStr for Platform {
    type Err = PacksmithError;

    /// Parse `os/arch`, or a bare arch which implies `linux`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => {
                Ok(Platform::new(os, arch))
            }
            None if !s.is_empty() => Ok(Platform::new("linux", s)),
            _ => Err(PacksmithError::Validation {
                message: format!("invalid platform '{s}', expected os/arch"),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
