//! Fault injection: per-method errors, per-method delays, call counters.

use costsource_types::{Method, Status};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Artificial latency added before a method answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelaySpec {
    Fixed { duration: Duration },
    /// Uniformly drawn from `[min, max]` on every call.
    Range { min: Duration, max: Duration },
}

impl DelaySpec {
    pub fn fixed(duration: Duration) -> Self {
        Self::Fixed { duration }
    }

    pub fn range(min: Duration, max: Duration) -> Self {
        Self::Range { min, max }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Fixed { .. } => true,
            Self::Range { min, max } => min <= max,
        }
    }

    /// Pick the delay for one call.
    pub fn sample(&self) -> Duration {
        match *self {
            Self::Fixed { duration } => duration,
            Self::Range { min, max } if min >= max => min,
            Self::Range { min, max } => {
                let nanos = rand::thread_rng().gen_range(min.as_nanos()..=max.as_nanos());
                Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
            }
        }
    }
}

/// Errors each method is forced to return, switchable while serving.
#[derive(Debug, Default)]
pub struct ErrorInjector {
    forced: RwLock<HashMap<Method, Status>>,
}

impl ErrorInjector {
    pub fn new(initial: HashMap<Method, Status>) -> Self {
        Self {
            forced: RwLock::new(initial),
        }
    }

    /// Every subsequent call to `method` fails with `status` until cleared.
    pub fn inject(&self, method: Method, status: Status) {
        self.forced
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(method, status);
    }

    pub fn clear(&self, method: Method) {
        self.forced
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&method);
    }

    pub fn clear_all(&self) {
        self.forced
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn check(&self, method: Method) -> Result<(), Status> {
        match self
            .forced
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&method)
        {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }

    pub fn is_injected(&self, method: Method) -> bool {
        self.check(method).is_err()
    }
}

/// Per-method call counters.
#[derive(Debug, Default)]
pub struct CallCounters {
    counts: [AtomicU64; Method::ALL.len()],
}

impl CallCounters {
    fn slot(method: Method) -> usize {
        Method::ALL
            .iter()
            .position(|m| *m == method)
            .unwrap_or_default()
    }

    pub fn record(&self, method: Method) -> u64 {
        self.counts[Self::slot(method)].fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, method: Method) -> u64 {
        self.counts[Self::slot(method)].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn reset(&self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
    }
}
