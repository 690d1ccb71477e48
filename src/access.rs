//! Access gate with attempt limiting.
//!
//! Used by front ends that protect redaction behind an access code. The
//! redaction engine itself never consults it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Failures allowed before a lockout.
pub const DEFAULT_MAX_FAILURES: u32 = 5;
/// Lockout length in minutes.
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 10;

/// Outcome of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    /// More attempts are allowed
    Open { remaining: u32 },
    /// Locked until the given instant
    Locked { until: DateTime<Utc> },
}

/// Counts failed attempts and decides when to lock.
pub trait AttemptLimiter {
    fn record_failure(&self) -> Result<LockoutState>;

    fn is_locked(&self) -> bool;

    /// Forget earlier failures (after a successful attempt).
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct AttemptRecord {
    failures: u32,
    locked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    fn locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    fn fail(&mut self, now: DateTime<Utc>, max_failures: u32, lockout: Duration) -> LockoutState {
        if let Some(until) = self.locked_until {
            if now < until {
                return LockoutState::Locked { until };
            }
            // Expired lockout starts a fresh window
            self.locked_until = None;
            self.failures = 0;
        }

        self.failures += 1;
        if self.failures >= max_failures {
            let until = now + lockout;
            self.locked_until = Some(until);
            LockoutState::Locked { until }
        } else {
            LockoutState::Open {
                remaining: max_failures - self.failures,
            }
        }
    }
}

/// In-process limiter.
#[derive(Debug)]
pub struct MemoryAttemptLimiter {
    record: Mutex<AttemptRecord>,
    max_failures: u32,
    lockout: Duration,
}

impl MemoryAttemptLimiter {
    pub fn new(max_failures: u32, lockout: Duration) -> Self {
        Self {
            record: Mutex::new(AttemptRecord::default()),
            max_failures,
            lockout,
        }
    }
}

impl Default for MemoryAttemptLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES, Duration::minutes(DEFAULT_LOCKOUT_MINUTES))
    }
}

impl AttemptLimiter for MemoryAttemptLimiter {
    fn record_failure(&self) -> Result<LockoutState> {
        let mut record = self
            .record
            .lock()
            .map_err(|_| Error::Other("attempt record poisoned".to_string()))?;
        Ok(record.fail(Utc::now(), self.max_failures, self.lockout))
    }

    fn is_locked(&self) -> bool {
        self.record
            .lock()
            .map(|r| r.locked_at(Utc::now()))
            .unwrap_or(true)
    }

    fn reset(&self) -> Result<()> {
        let mut record = self
            .record
            .lock()
            .map_err(|_| Error::Other("attempt record poisoned".to_string()))?;
        *record = AttemptRecord::default();
        Ok(())
    }
}

/// Limiter persisted as a small JSON file, so the count survives restarts.
#[derive(Debug, Clone)]
pub struct FileAttemptLimiter {
    path: PathBuf,
    max_failures: u32,
    lockout: Duration,
}

impl FileAttemptLimiter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_failures: DEFAULT_MAX_FAILURES,
            lockout: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        }
    }

    pub fn with_limits(mut self, max_failures: u32, lockout: Duration) -> Self {
        self.max_failures = max_failures;
        self.lockout = lockout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AttemptRecord {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn store(&self, record: &AttemptRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(record)?)?;
        Ok(())
    }
}

impl AttemptLimiter for FileAttemptLimiter {
    fn record_failure(&self) -> Result<LockoutState> {
        let mut record = self.load();
        let state = record.fail(Utc::now(), self.max_failures, self.lockout);
        self.store(&record)?;
        Ok(state)
    }

    fn is_locked(&self) -> bool {
        self.load().locked_at(Utc::now())
    }

    fn reset(&self) -> Result<()> {
        self.store(&AttemptRecord::default())
    }
}

/// Access-code check backed by an [`AttemptLimiter`].
pub struct AccessGate<L: AttemptLimiter> {
    code: String,
    limiter: L,
}

impl<L: AttemptLimiter> AccessGate<L> {
    pub fn new(code: impl Into<String>, limiter: L) -> Self {
        Self {
            code: code.into(),
            limiter,
        }
    }

    /// Check an attempt. A locked gate rejects even the right code.
    pub fn check(&self, attempt: &str) -> Result<()> {
        if self.limiter.is_locked() {
            return Err(Error::Locked("lockout in effect".to_string()));
        }
        if attempt == self.code {
            return self.limiter.reset();
        }
        match self.limiter.record_failure()? {
            LockoutState::Open { remaining } => Err(Error::Other(format!(
                "invalid access code ({} attempts left)",
                remaining
            ))),
            LockoutState::Locked { until } => Err(Error::Locked(until.to_rfc3339())),
        }
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }
}
