use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))?;
    u64::try_from(elapsed.as_millis())
        .map_err(|_| CoreError::InvalidData("system clock out of range".into()))
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

/// Issues strictly increasing timestamps, following wall time when it moves
/// forward and stepping by one millisecond when it does not.
pub struct Clock {
    last_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self { last_ms: 0 }
    }

    pub fn tick(&mut self) -> Result<Timestamp, CoreError> {
        let now = physical_now()?;
        self.last_ms = if now > self.last_ms {
            now
        } else {
            self.last_ms + 1
        };
        Ok(Timestamp(self.last_ms))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
