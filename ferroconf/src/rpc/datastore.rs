//! Configuration datastore selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named configuration datastore on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    Candidate,
    #[default]
    Running,
    Startup,
}

impl Datastore {
    /// Element name used inside `<source>` / `<target>`.
    pub fn as_str(self) -> &'static str {
        match self {
            Datastore::Candidate => "candidate",
            Datastore::Running => "running",
            Datastore::Startup => "startup",
        }
    }

    /// Resolve an optional command-line argument; absent means running.
    pub fn from_arg(arg: Option<&str>) -> Result<Self> {
        arg.map_or(Ok(Datastore::Running), str::parse)
    }
}

impl FromStr for Datastore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "candidate" => Ok(Datastore::Candidate),
            "running" => Ok(Datastore::Running),
            "startup" => Ok(Datastore::Startup),
            other => Err(Error::invalid_argument(format!(
                "invalid datastore '{}'; use candidate, running, startup or neither",
                other
            ))),
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
