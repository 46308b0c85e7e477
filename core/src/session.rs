//! Session token shared by every call made through one client.
//!
//! The token sits behind a single mutex. Callers can only read it, replace
//! it, or clear it, each as one critical section; the lock is never held
//! while a request is in flight.

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct SessionState {
    current: Mutex<Option<String>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current session id.
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Install `session_id`, returning the session it replaced.
    pub fn replace(&self, session_id: String) -> Option<String> {
        self.current.lock().replace(session_id)
    }

    /// Clear the session only if it is still `session_id`, so a logout never
    /// drops a session established concurrently by another login.
    pub fn clear_if(&self, session_id: &str) -> bool {
        let mut current = self.current.lock();
        if current.as_deref() == Some(session_id) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Unconditionally drop the session.
    pub fn clear(&self) -> Option<String> {
        self.current.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_session() {
        assert_eq!(SessionState::new().current(), None);
    }

    #[test]
    fn replace_returns_previous() {
        let state = SessionState::new();
        assert_eq!(state.replace("S1".to_string()), None);
        assert_eq!(state.replace("S2".to_string()), Some("S1".to_string()));
        assert_eq!(state.current().as_deref(), Some("S2"));
    }

    #[test]
    fn clear_if_ignores_stale_session() {
        let state = SessionState::new();
        state.replace("S2".to_string());
        assert!(!state.clear_if("S1"));
        assert_eq!(state.current().as_deref(), Some("S2"));
        assert!(state.clear_if("S2"));
        assert_eq!(state.current(), None);
    }

    #[test]
    fn clear_takes_session() {
        let state = SessionState::new();
        state.replace("S1".to_string());
        assert_eq!(state.clear().as_deref(), Some("S1"));
        assert_eq!(state.clear(), None);
    }
}
