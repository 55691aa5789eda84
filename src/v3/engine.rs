//! Authoritative engine state and time synchronization (RFC 3414 §4).
//!
//! A request to a v3 agent needs its snmpEngineID, snmpEngineBoots and
//! snmpEngineTime. They are learned by discovery (an empty noAuthNoPriv
//! request the agent answers with a usmStatsUnknownEngineIDs report) and
//! kept current from every authenticated reply.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;

/// Seconds a message may be off the agent's clock (RFC 3414 §2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// snmpEngineTime and snmpEngineBoots stop at this value.
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// What we know about one authoritative engine.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    /// When `engine_time` was last taken from the agent.
    pub synced_at: Instant,
    /// Highest engine time seen in this boot cycle.
    pub latest_received_engine_time: u32,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_engine_time: engine_time,
        }
    }

    /// The agent's clock now, extrapolated from the last sync.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = u32::try_from(self.synced_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.engine_time.saturating_add(elapsed).min(MAX_ENGINE_TIME)
    }

    /// Take the clock from an authentic reply. Returns whether it moved.
    ///
    /// Only a newer boot cycle, or a later time in the same cycle, is
    /// accepted; older values would reopen the replay window.
    pub fn update_time(&mut self, boots: u32, time: u32) -> bool {
        let newer = boots > self.engine_boots
            || (boots == self.engine_boots && time > self.latest_received_engine_time);
        if newer {
            self.engine_boots = boots;
            self.engine_time = time;
            self.latest_received_engine_time = time;
            self.synced_at = Instant::now();
        }
        newer
    }

    /// Whether a message stamped `boots`/`time` falls inside the window.
    pub fn is_in_time_window(&self, boots: u32, time: u32) -> bool {
        self.engine_boots != MAX_ENGINE_TIME
            && boots == self.engine_boots
            && time.abs_diff(self.estimated_time()) <= TIME_WINDOW
    }
}

/// Discovered engines keyed by agent address, shared by session clones.
#[derive(Debug, Default)]
pub struct EngineCache {
    engines: RwLock<HashMap<SocketAddr, EngineState>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &SocketAddr) -> Option<EngineState> {
        self.engines.read().ok()?.get(target).cloned()
    }

    pub fn insert(&self, target: SocketAddr, state: EngineState) {
        if let Ok(mut engines) = self.engines.write() {
            engines.insert(target, state);
        }
    }

    pub fn update_time(&self, target: &SocketAddr, boots: u32, time: u32) -> bool {
        if let Ok(mut engines) = self.engines.write()
            && let Some(state) = engines.get_mut(target)
        {
            return state.update_time(boots, time);
        }
        false
    }

    /// Forget `target` so the next request rediscovers it.
    pub fn remove(&self, target: &SocketAddr) -> Option<EngineState> {
        self.engines.write().ok()?.remove(target)
    }

    pub fn len(&self) -> usize {
        self.engines.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn state() -> EngineState {
        EngineState::new(Bytes::from_static(b"engine"), 5, 1000)
    }

    #[test]
    fn clock_only_moves_forward() {
        let mut state = state();
        assert!(!state.update_time(5, 900));
        assert!(!state.update_time(4, 5000));
        assert!(!state.update_time(5, 1000));
        assert_eq!(state.engine_time, 1000);

        assert!(state.update_time(5, 1010));
        assert_eq!(state.latest_received_engine_time, 1010);

        // a reboot resets the time
        assert!(state.update_time(6, 3));
        assert_eq!((state.engine_boots, state.engine_time), (6, 3));
    }

    #[test]
    fn estimated_time_adds_elapsed_and_saturates() {
        let mut state = state();
        state.synced_at = Instant::now() - Duration::from_secs(30);
        assert!((1030..=1031).contains(&state.estimated_time()));

        state.engine_time = MAX_ENGINE_TIME - 1;
        assert_eq!(state.estimated_time(), MAX_ENGINE_TIME);
    }

    #[test]
    fn time_window_checks_boots_and_drift() {
        let mut state = state();
        assert!(state.is_in_time_window(5, 1000 + TIME_WINDOW));
        assert!(!state.is_in_time_window(5, 1001 + TIME_WINDOW));
        assert!(!state.is_in_time_window(4, 1000));

        state.engine_boots = MAX_ENGINE_TIME;
        assert!(!state.is_in_time_window(MAX_ENGINE_TIME, 1000));
    }

    #[test]
    fn cache_is_keyed_by_address() {
        let cache = EngineCache::new();
        let a: SocketAddr = "192.0.2.1:161".parse().unwrap();
        let b: SocketAddr = "192.0.2.2:161".parse().unwrap();

        cache.insert(a, state());
        assert!(cache.get(&b).is_none());
        assert!(cache.update_time(&a, 5, 2000));
        assert!(!cache.update_time(&b, 5, 2000));
        assert_eq!(cache.get(&a).unwrap().engine_time, 2000);

        assert!(cache.remove(&a).is_some());
        assert!(cache.is_empty());
    }
}
