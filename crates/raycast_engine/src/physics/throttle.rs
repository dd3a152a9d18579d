//! Compute-time throttle for ray casts
//!
//! A rolling-window ledger of what recent calls cost, shared by every
//! caller in the process. A call is admitted only while both its region
//! and its avatar have budget left; admitted calls always run to the end
//! and their measured cost is charged afterwards. The gate does accounting
//! only, it never interrupts a call in progress.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::debug;

use crate::core::config::ThrottleConfig;
use crate::foundation::time::{as_millis_f32, Clock};
use crate::scene::{AgentId, RegionId};

/// One charged call in the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastRayCall {
    /// Region the call ran in
    pub region: RegionId,
    /// Avatar the call is billed to
    pub user: AgentId,
    /// When the cost was charged
    pub timestamp: Duration,
    /// Measured cost in milliseconds
    pub cost_ms: f32,
}

/// Permission to run one call; hand it back to [`ThrottleGate::record`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use = "an admission should be recorded once the call finishes"]
pub struct Admission {
    region: RegionId,
    user: AgentId,
    started: Duration,
    available_ms: f32,
}

impl Admission {
    /// Clock reading when the call was admitted
    pub fn started(&self) -> Duration {
        self.started
    }

    /// Budget that was left at admission
    pub fn available_ms(&self) -> f32 {
        self.available_ms
    }
}

/// Returned when too little budget is left to start a call
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error("insufficient ray-cast time: {available_ms:.3} ms available")]
pub struct ThrottleDenial {
    /// Budget left at the time of the request
    pub available_ms: f32,
}

/// Per-region and per-avatar compute budget over a rolling window
pub struct ThrottleGate {
    config: ThrottleConfig,
    clock: Arc<dyn Clock>,
    ledger: Mutex<VecDeque<CastRayCall>>,
}

impl ThrottleGate {
    /// Create a gate with an empty ledger
    pub fn new(config: ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            ledger: Mutex::new(VecDeque::new()),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.config.window_ms)
    }

    /// Drop entries older than the window. Timestamps are read under the
    /// ledger lock, so entries are in timestamp order.
    fn prune(&self, ledger: &mut VecDeque<CastRayCall>, now: Duration) {
        let window = self.window();
        while ledger
            .front()
            .is_some_and(|call| now.saturating_sub(call.timestamp) > window)
        {
            ledger.pop_front();
        }
    }

    /// Region spend counts every avatar in `region`; avatar spend counts
    /// `user` in every region.
    fn available_in(&self, ledger: &VecDeque<CastRayCall>, region: RegionId, user: AgentId) -> f32 {
        let (region_used, user_used) =
            ledger
                .iter()
                .fold((0.0_f32, 0.0_f32), |(mut region_used, mut user_used), call| {
                    if call.region == region {
                        region_used += call.cost_ms;
                    }
                    if call.user == user {
                        user_used += call.cost_ms;
                    }
                    (region_used, user_used)
                });

        (self.config.region_budget_ms - region_used).min(self.config.avatar_budget_ms - user_used)
    }

    /// Milliseconds `user` may still spend in `region` right now
    pub fn available_ms(&self, region: RegionId, user: AgentId) -> f32 {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        self.prune(&mut ledger, now);
        self.available_in(&ledger, region, user)
    }

    /// Admit a call or refuse it when less than the minimum budget is left
    pub fn admit(&self, region: RegionId, user: AgentId) -> Result<Admission, ThrottleDenial> {
        let (now, available_ms) = {
            let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            let now = self.clock.now();
            self.prune(&mut ledger, now);
            (now, self.available_in(&ledger, region, user))
        };

        if available_ms < self.config.min_available_ms {
            debug!(
                "Ray cast throttled for {:?} in {:?}: {:.3} ms available",
                user, region, available_ms
            );
            return Err(ThrottleDenial { available_ms });
        }

        Ok(Admission {
            region,
            user,
            started: now,
            available_ms,
        })
    }

    /// Charge a finished call
    pub fn record(&self, admission: Admission, cost: Duration) {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        self.prune(&mut ledger, now);
        ledger.push_back(CastRayCall {
            region: admission.region,
            user: admission.user,
            timestamp: now,
            cost_ms: as_millis_f32(cost),
        });
    }

    /// Number of calls still inside the window
    pub fn ledger_len(&self) -> usize {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        self.prune(&mut ledger, now);
        ledger.len()
    }

    /// Throttle settings
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::time::ManualClock;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    const REGION: RegionId = RegionId(1);

    fn gate() -> (ThrottleGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = ThrottleConfig {
            window_ms: 1000,
            region_budget_ms: 40.0,
            avatar_budget_ms: 10.0,
            min_available_ms: 2.0,
        };
        (ThrottleGate::new(config, clock.clone()), clock)
    }

    fn charge(gate: &ThrottleGate, user: AgentId, cost_ms: u64) {
        let admission = gate.admit(REGION, user).unwrap();
        gate.record(admission, Duration::from_millis(cost_ms));
    }

    #[test]
    fn test_fresh_gate_offers_avatar_budget() {
        let (gate, _) = gate();
        assert_relative_eq!(gate.available_ms(REGION, AgentId(1)), 10.0);
    }

    #[test]
    fn test_avatar_budget_exhausted_within_window() {
        let (gate, clock) = gate();
        charge(&gate, AgentId(1), 9);
        clock.advance(Duration::from_millis(100));

        let denial = gate.admit(REGION, AgentId(1)).unwrap_err();
        assert_relative_eq!(denial.available_ms, 1.0, epsilon = 1e-4);

        // Another avatar in the same region is unaffected
        assert!(gate.admit(REGION, AgentId(2)).is_ok());
    }

    #[test]
    fn test_budget_recovers_after_window() {
        let (gate, clock) = gate();
        charge(&gate, AgentId(1), 9);
        assert!(gate.admit(REGION, AgentId(1)).is_err());

        clock.advance(Duration::from_millis(1001));
        assert!(gate.admit(REGION, AgentId(1)).is_ok());
        assert_eq!(gate.ledger_len(), 0);
    }

    #[test]
    fn test_region_budget_is_shared() {
        let (gate, _) = gate();
        for user in 1..=4 {
            charge(&gate, AgentId(user), 10);
        }
        // Avatar 5 has spent nothing, but the region has.
        assert!(gate.admit(REGION, AgentId(5)).is_err());
        assert!(gate.admit(RegionId(2), AgentId(5)).is_ok());
    }

    #[test]
    fn test_avatar_budget_follows_avatar_across_regions() {
        let (gate, _) = gate();
        charge(&gate, AgentId(7), 9);

        // Region 2 is untouched, but avatar 7 has spent 9 of its 10 ms.
        assert_relative_eq!(gate.available_ms(RegionId(2), AgentId(7)), 1.0, epsilon = 1e-4);
        assert!(gate.admit(RegionId(2), AgentId(7)).is_err());
        assert!(gate.admit(RegionId(2), AgentId(8)).is_ok());
    }

    #[test]
    fn test_admission_alone_costs_nothing() {
        let (gate, _) = gate();
        for _ in 0..100 {
            let _ = gate.admit(REGION, AgentId(1)).unwrap();
        }
        assert_eq!(gate.ledger_len(), 0);
    }

    #[test]
    fn test_concurrent_records() {
        let (gate, _) = gate();
        let gate = Arc::new(gate);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let admission = gate.admit(RegionId(100 + i), AgentId(i)).unwrap();
                        gate.record(admission, Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(gate.ledger_len(), 80);
    }

    /// Moves forward one microsecond on every read
    struct TickingClock(AtomicU64);

    impl Clock for TickingClock {
        fn now(&self) -> Duration {
            Duration::from_micros(self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn test_ledger_stays_in_timestamp_order() {
        let config = ThrottleConfig {
            avatar_budget_ms: 1000.0,
            region_budget_ms: 1000.0,
            ..ThrottleConfig::default()
        };
        let gate = Arc::new(ThrottleGate::new(config, Arc::new(TickingClock(AtomicU64::new(0)))));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let admission = gate.admit(RegionId(i), AgentId(i)).unwrap();
                        gate.record(admission, Duration::from_micros(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ledger = gate.ledger.lock().unwrap();
        assert_eq!(ledger.len(), 400);
        assert!(ledger
            .iter()
            .zip(ledger.iter().skip(1))
            .all(|(a, b)| a.timestamp <= b.timestamp));
    }
}
