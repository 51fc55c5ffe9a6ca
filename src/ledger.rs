use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

// Which counter a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Questions,
    ImageGenerations,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Questions => "questions",
            Category::ImageGenerations => "image generations",
        }
    }
}

// Calendar window after which counters zero. Boundaries are calendar
// comparisons, not elapsed durations: a daily reset fires at date rollover
// no matter how many hours have passed since last use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResetPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl ResetPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            ResetPeriod::Daily => "daily",
            ResetPeriod::Weekly => "weekly",
            ResetPeriod::Monthly => "monthly",
        }
    }
}

// One ledger entry. last_reset stays a string on disk; an unreadable
// timestamp is treated as "reset due" rather than ever blocking a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default)]
    pub questions: u64,
    #[serde(default)]
    pub image_generations: u64,
    #[serde(default)]
    pub last_reset: String,
}

impl UsageRecord {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            questions: 0,
            image_generations: 0,
            last_reset: now.to_rfc3339(),
        }
    }

    pub fn count(&self, category: Category) -> u64 {
        match category {
            Category::Questions => self.questions,
            Category::ImageGenerations => self.image_generations,
        }
    }

    fn bump(&mut self, category: Category) {
        match category {
            Category::Questions => self.questions += 1,
            Category::ImageGenerations => self.image_generations += 1,
        }
    }

    fn reset(&mut self, now: DateTime<Utc>) {
        self.questions = 0;
        self.image_generations = 0;
        self.last_reset = now.to_rfc3339();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UsageLimits {
    pub max_questions: u64,
    pub max_image_generations: u64,
    pub reset_period: ResetPeriod,
}

impl UsageLimits {
    pub fn max_for(&self, category: Category) -> u64 {
        match category {
            Category::Questions => self.max_questions,
            Category::ImageGenerations => self.max_image_generations,
        }
    }
}

// Whether the window between last_reset and now has rolled over.
pub fn reset_due(last_reset: &str, now: DateTime<Utc>, period: ResetPeriod) -> bool {
    let Ok(last) = DateTime::parse_from_rfc3339(last_reset) else {
        return true;
    };
    let last = last.with_timezone(&Utc);
    match period {
        ResetPeriod::Daily => now.date_naive() != last.date_naive(),
        ResetPeriod::Weekly => now.iso_week() != last.iso_week(),
        ResetPeriod::Monthly => (now.year(), now.month()) != (last.year(), last.month()),
    }
}

// Durable per-identity usage counters, persisted as one JSON snapshot.
//
// The file is the source of truth: every operation re-reads it, mutates and
// writes it back while holding the mutex, so an externally deleted or
// corrupted store just means everyone starts fresh. The lock is never held
// across a provider call; two in-flight requests from the same identity can
// therefore over-admit by one, a bounded race we accept instead of
// serializing callers behind a remote round-trip.
pub struct UsageLedger {
    path: PathBuf,
    limits: UsageLimits,
    lock: Mutex<()>,
}

impl UsageLedger {
    pub fn new(path: PathBuf, limits: UsageLimits) -> Self {
        Self {
            path,
            limits,
            lock: Mutex::new(()),
        }
    }

    pub fn limits(&self) -> UsageLimits {
        self.limits
    }

    // Load-or-create the record, apply any due reset, compare against the
    // category limit. Does NOT consume quota - commit() does that after the
    // provider call succeeds.
    pub fn check_and_get(&self, identity: &str, category: Category) -> (bool, u64) {
        self.check_and_get_at(identity, category, Utc::now())
    }

    fn check_and_get_at(
        &self,
        identity: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> (bool, u64) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut store = self.read_store();
        let mut dirty = false;

        let record = store.entry(identity.to_string()).or_insert_with(|| {
            dirty = true;
            UsageRecord::fresh(now)
        });

        if reset_due(&record.last_reset, now, self.limits.reset_period) {
            record.reset(now);
            dirty = true;
        }

        let current = record.count(category);
        let admitted = current < self.limits.max_for(category);

        if dirty {
            self.write_store(&store);
        }
        (admitted, current)
    }

    // Charge one unit. Only called after a successful provider response for
    // a request this ledger already admitted.
    pub fn commit(&self, identity: &str, category: Category) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut store = self.read_store();
        store
            .entry(identity.to_string())
            .or_insert_with(|| UsageRecord::fresh(Utc::now()))
            .bump(category);
        self.write_store(&store);
    }

    // Current counts for GET /usage. Applies the same reset check as the
    // quota path, so a rolled-over window zeroes the record here too.
    pub fn usage_for(&self, identity: &str) -> (u64, u64) {
        self.usage_for_at(identity, Utc::now())
    }

    fn usage_for_at(&self, identity: &str, now: DateTime<Utc>) -> (u64, u64) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut store = self.read_store();
        let Some(record) = store.get_mut(identity) else {
            return (0, 0);
        };
        if reset_due(&record.last_reset, now, self.limits.reset_period) {
            record.reset(now);
            let counts = (record.questions, record.image_generations);
            self.write_store(&store);
            return counts;
        }
        (record.questions, record.image_generations)
    }

    fn read_store(&self) -> HashMap<String, UsageRecord> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "usage store unreadable, treating as empty");
                }
                return HashMap::new();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "usage store corrupt, treating as empty");
            HashMap::new()
        })
    }

    // Best effort: a failed save must never abort the request being served.
    fn write_store(&self, store: &HashMap<String, UsageRecord>) {
        match serde_json::to_vec_pretty(store) {
            Ok(raw) => {
                if let Err(e) = fs::write(&self.path, raw) {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to persist usage store");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize usage store");
            }
        }
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
