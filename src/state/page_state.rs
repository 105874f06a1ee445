//! Page state definitions for tracking crawl progress
//!
//! A URL moves `Discovered → Requested → {Succeeded, Failed}`.

use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Link was emitted with `nofollow = false` and the scope accepted it
    Discovered,

    /// Handed to the fetch collaborator
    Requested,

    // ===== Terminal States =====
    /// A response was received (including HTTP error statuses)
    Succeeded,

    /// Transport failure: DNS, timeout or an unclassified error
    Failed,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: PageState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Requested)
                | (Self::Requested, Self::Succeeded)
                | (Self::Requested, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Requested => "requested",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> [Self; 4] {
        [Self::Discovered, Self::Requested, Self::Succeeded, Self::Failed]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!PageState::Discovered.is_terminal());
        assert!(!PageState::Requested.is_terminal());
        assert!(PageState::Succeeded.is_terminal());
        assert!(PageState::Failed.is_terminal());
    }

    #[test]
    fn test_is_active() {
        assert!(PageState::Discovered.is_active());
        assert!(PageState::Requested.is_active());
        assert!(!PageState::Succeeded.is_active());
        assert!(!PageState::Failed.is_active());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(PageState::Discovered.can_transition_to(PageState::Requested));
        assert!(PageState::Requested.can_transition_to(PageState::Succeeded));
        assert!(PageState::Requested.can_transition_to(PageState::Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!PageState::Discovered.can_transition_to(PageState::Succeeded));
        assert!(!PageState::Discovered.can_transition_to(PageState::Failed));
        assert!(!PageState::Requested.can_transition_to(PageState::Discovered));

        for state in PageState::all_states() {
            assert!(!PageState::Succeeded.can_transition_to(state));
            assert!(!PageState::Failed.can_transition_to(state));
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PageState::Discovered), "discovered");
        assert_eq!(format!("{}", PageState::Requested), "requested");
        assert_eq!(format!("{}", PageState::Succeeded), "succeeded");
        assert_eq!(format!("{}", PageState::Failed), "failed");
    }
}
