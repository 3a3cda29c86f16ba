//! One circuit breaker per upstream, with snapshot and reset operations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::clock::Clock;
use crate::event::Source;

/// Fixed registry holding exactly one breaker per upstream source.
#[derive(Debug, Clone)]
pub struct BreakerRegistry {
    usgs: Arc<CircuitBreaker>,
    eonet: Arc<CircuitBreaker>,
    gdacs: Arc<CircuitBreaker>,
    reliefweb: Arc<CircuitBreaker>,
    nws: Arc<CircuitBreaker>,
}

impl BreakerRegistry {
    pub fn new(threshold: u32, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        let breaker = || Arc::new(CircuitBreaker::new(threshold, timeout, clock.clone()));
        Self {
            usgs: breaker(),
            eonet: breaker(),
            gdacs: breaker(),
            reliefweb: breaker(),
            nws: breaker(),
        }
    }

    /// The breaker guarding the given source.
    pub fn get(&self, source: Source) -> Arc<CircuitBreaker> {
        match source {
            Source::Usgs => self.usgs.clone(),
            Source::NasaEonet => self.eonet.clone(),
            Source::Gdacs => self.gdacs.clone(),
            Source::ReliefWeb => self.reliefweb.clone(),
            Source::Nws => self.nws.clone(),
        }
    }

    /// Reset one breaker to CLOSED.
    pub fn reset(&self, source: Source) {
        self.get(source).reset();
        tracing::info!(%source, "circuit breaker reset");
    }

    /// Reset every breaker to CLOSED.
    pub fn reset_all(&self) {
        for source in Source::ALL {
            self.get(source).reset();
        }
        tracing::info!("all circuit breakers reset");
    }

    /// Point-in-time view of every breaker, in source order.
    pub fn snapshot(&self) -> BTreeMap<Source, BreakerSnapshot> {
        Source::ALL.into_iter().map(|source| (source, self.get(source).snapshot())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use crate::clock::ManualClock;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(2, Duration::from_secs(60), Arc::new(ManualClock::new()))
    }

    #[test]
    fn holds_one_breaker_per_source() {
        let registry = registry();
        assert_eq!(registry.snapshot().len(), Source::ALL.len());
    }

    #[test]
    fn breakers_are_independent() {
        let registry = registry();
        registry.get(Source::Nws).on_failure();
        registry.get(Source::Nws).on_failure();
        let snap = registry.snapshot();
        assert_eq!(snap[&Source::Nws].state, BreakerState::Open);
        assert_eq!(snap[&Source::Usgs].state, BreakerState::Closed);
    }

    #[test]
    fn reset_one_leaves_the_rest() {
        let registry = registry();
        for source in Source::ALL {
            registry.get(source).on_failure();
            registry.get(source).on_failure();
        }
        registry.reset(Source::Gdacs);
        let snap = registry.snapshot();
        assert_eq!(snap[&Source::Gdacs].state, BreakerState::Closed);
        assert_eq!(snap[&Source::ReliefWeb].state, BreakerState::Open);
    }

    #[test]
    fn reset_all_clears_everything() {
        let registry = registry();
        for source in Source::ALL {
            registry.get(source).on_failure();
            registry.get(source).on_failure();
        }
        registry.reset_all();
        for (_, snap) in registry.snapshot() {
            assert_eq!(snap.state, BreakerState::Closed);
            assert_eq!(snap.failures, 0);
        }
    }
}
