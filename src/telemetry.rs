//! Tracing setup and anti-cheat counters

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `log_level` when set. Calling this twice is harmless;
/// the second install is ignored.
pub fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

/// A structurally valid request the weapon refused in its current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredRequest {
    /// Trigger pulled with an empty magazine
    FireWhileEmpty,
    /// Trigger pulled during an all-at-once reload
    FireDuringBulkReload,
    /// Reload asked for while one is running
    ReloadWhileReloading,
    /// Reload asked for with no reserve ammo
    ReloadWithoutReserve,
    /// Reload asked for with a full magazine
    ReloadWithFullMagazine,
    /// Round-by-round reload asked for with the trigger held and rounds left
    ReloadWhileFiring,
    /// Hit reported when no legal shot could have been fired
    HitWhileDepleted,
}

impl fmt::Display for IgnoredRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FireWhileEmpty => "fire while empty",
            Self::FireDuringBulkReload => "fire during reload",
            Self::ReloadWhileReloading => "reload while reloading",
            Self::ReloadWithoutReserve => "reload without reserve",
            Self::ReloadWithFullMagazine => "reload with full magazine",
            Self::ReloadWhileFiring => "reload while firing",
            Self::HitWhileDepleted => "hit while depleted",
        };
        f.write_str(label)
    }
}

/// Per-reason tally of ignored requests for one weapon holder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestLedger {
    counts: BTreeMap<IgnoredRequest, u64>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, request: IgnoredRequest) {
        *self.counts.entry(request).or_insert(0) += 1;
    }

    pub fn count(&self, request: IgnoredRequest) -> u64 {
        self.counts.get(&request).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IgnoredRequest, u64)> + '_ {
        self.counts.iter().map(|(request, count)| (*request, *count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_tallies_per_reason() {
        let mut ledger = RequestLedger::new();
        ledger.record(IgnoredRequest::FireWhileEmpty);
        ledger.record(IgnoredRequest::FireWhileEmpty);
        ledger.record(IgnoredRequest::ReloadWhileReloading);

        assert_eq!(ledger.count(IgnoredRequest::FireWhileEmpty), 2);
        assert_eq!(ledger.count(IgnoredRequest::ReloadWhileFiring), 0);
        assert_eq!(ledger.total(), 3);
        assert_eq!(ledger.iter().count(), 2);
    }

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing("debug");
        init_tracing("info");
    }
}
