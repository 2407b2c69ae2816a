// src/freshness.rs
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// "Is this digest today's?", judged by the civil calendar of one fixed zone
/// (the service's operating locale), never UTC and never the reader's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    tz: Tz,
}

impl FreshnessPolicy {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn pacific() -> Self {
        Self::new(chrono_tz::America::Los_Angeles)
    }

    pub fn zone(&self) -> Tz {
        self.tz
    }

    pub fn civil_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    pub fn is_fresh(&self, generated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.civil_date(generated_at) == self.civil_date(now)
    }

    /// Human label for the zone's current day, e.g. "February 20, 2026".
    pub fn date_label(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%B %-d, %Y").to_string()
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::pacific()
    }
}
