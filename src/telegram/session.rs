//! Per-user spin history and risk profile, kept in memory.

use dashmap::DashMap;

use super::recommend::{RiskMode, Spin};

/// Oldest spins are dropped past this length
pub const MAX_HISTORY: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub history: Vec<Spin>,
    pub mode: RiskMode,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<i64, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `spin` and returns a snapshot to recommend from, so the map
    /// is not locked while the ledger is consulted.
    pub fn record(&self, user_id: i64, spin: Spin) -> Session {
        let mut session = self.sessions.entry(user_id).or_default();
        session.history.push(spin);
        if session.history.len() > MAX_HISTORY {
            let excess = session.history.len() - MAX_HISTORY;
            session.history.drain(..excess);
        }
        session.clone()
    }

    pub fn snapshot(&self, user_id: i64) -> Session {
        self.sessions.get(&user_id).map(|s| s.clone()).unwrap_or_default()
    }

    /// Switches the risk profile and returns the new one.
    pub fn toggle_mode(&self, user_id: i64) -> RiskMode {
        let mut session = self.sessions.entry(user_id).or_default();
        session.mode = session.mode.toggled();
        session.mode
    }

    /// Clears the history, keeping the profile.
    pub fn reset(&self, user_id: i64) {
        if let Some(mut session) = self.sessions.get_mut(&user_id) {
            session.history.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_appends_per_user() {
        let sessions = SessionRegistry::new();
        sessions.record(1, Spin::Red);
        let one = sessions.record(1, Spin::Zero);
        let two = sessions.record(2, Spin::Black);

        assert_eq!(one.history, vec![Spin::Red, Spin::Zero]);
        assert_eq!(two.history, vec![Spin::Black]);
        assert_eq!(one.mode, RiskMode::Conservative);
    }

    #[test]
    fn test_history_is_capped() {
        let sessions = SessionRegistry::new();
        sessions.record(1, Spin::Zero);
        for _ in 0..MAX_HISTORY {
            sessions.record(1, Spin::Red);
        }

        let session = sessions.snapshot(1);
        assert_eq!(session.history.len(), MAX_HISTORY);
        assert!(!session.history.contains(&Spin::Zero));
    }

    #[test]
    fn test_reset_keeps_mode() {
        let sessions = SessionRegistry::new();
        sessions.record(1, Spin::Red);
        assert_eq!(sessions.toggle_mode(1), RiskMode::Aggressive);

        sessions.reset(1);

        let session = sessions.snapshot(1);
        assert!(session.history.is_empty());
        assert_eq!(session.mode, RiskMode::Aggressive);
        assert_eq!(sessions.toggle_mode(1), RiskMode::Conservative);
    }
}
