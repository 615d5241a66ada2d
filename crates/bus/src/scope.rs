//! Subscription scopes - which published events a subscriber accepts
//!
//! Visibility is layered:
//!
//! | Subscription        | Global event | Event for group `g` |
//! |---------------------|--------------|---------------------|
//! | `Global`            | yes          | no                  |
//! | `Isolated(i)`       | yes          | `i == g`            |
//! | `Selective(None)`   | yes          | yes                 |
//! | `Selective(set)`    | yes          | `g ∈ set`           |

use serde::{Deserialize, Serialize};
use shared::{GroupId, ScopeConfigurationError};
use std::collections::BTreeSet;
use std::fmt;

/// Scope an event is published with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishScope {
    /// Platform-wide event, reaches every subscriber
    Global,
    /// Event belonging to one processing group
    Group(GroupId),
}

impl PublishScope {
    pub fn group(id: impl Into<GroupId>) -> Self {
        Self::Group(id.into())
    }

    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            PublishScope::Global => None,
            PublishScope::Group(g) => Some(g),
        }
    }
}

impl fmt::Display for PublishScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishScope::Global => write!(f, "global"),
            PublishScope::Group(g) => write!(f, "group:{}", g),
        }
    }
}

/// Scope a subscriber registers with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionScope {
    /// Platform-wide events only; never sees group-scoped events
    #[default]
    Global,
    /// Global events plus events of exactly one group
    Isolated(GroupId),
    /// Global events plus events of the listed groups; `None` means all groups
    Selective(Option<BTreeSet<GroupId>>),
}

impl SubscriptionScope {
    pub fn isolated(group: impl Into<GroupId>) -> Self {
        Self::Isolated(group.into())
    }

    /// Listen to a set of groups. An empty set means every group.
    pub fn selective<I, G>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        let set: BTreeSet<GroupId> = groups.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Self::Selective(None)
        } else {
            Self::Selective(Some(set))
        }
    }

    /// Unrestricted platform listener
    pub fn all_groups() -> Self {
        Self::Selective(None)
    }

    /// Reject malformed scopes instead of coercing them
    pub fn validate(&self) -> Result<(), ScopeConfigurationError> {
        match self {
            SubscriptionScope::Global | SubscriptionScope::Selective(None) => Ok(()),
            SubscriptionScope::Isolated(group) if group.is_empty() => Err(ScopeConfigurationError {
                scope: self.to_string(),
                reason: "isolated scope requires a non-empty group id".to_string(),
            }),
            SubscriptionScope::Isolated(_) => Ok(()),
            SubscriptionScope::Selective(Some(groups)) if groups.is_empty() => {
                Err(ScopeConfigurationError {
                    scope: self.to_string(),
                    reason: "selective group set is present but empty; omit it to listen to all groups"
                        .to_string(),
                })
            }
            SubscriptionScope::Selective(Some(groups)) => {
                if groups.iter().any(GroupId::is_empty) {
                    return Err(ScopeConfigurationError {
                        scope: self.to_string(),
                        reason: "selective group set contains an empty group id".to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Whether an event published with `publish` reaches this subscriber
    pub fn should_receive(&self, publish: &PublishScope) -> bool {
        let group = match publish {
            PublishScope::Global => return true,
            PublishScope::Group(g) => g,
        };

        match self {
            SubscriptionScope::Global => false,
            SubscriptionScope::Isolated(own) => own == group,
            SubscriptionScope::Selective(None) => true,
            SubscriptionScope::Selective(Some(groups)) => groups.contains(group),
        }
    }
}

impl fmt::Display for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionScope::Global => write!(f, "global"),
            SubscriptionScope::Isolated(g) => write!(f, "isolated:{}", g),
            SubscriptionScope::Selective(None) => write!(f, "selective:*"),
            SubscriptionScope::Selective(Some(groups)) => {
                let names: Vec<&str> = groups.iter().map(|g| g.as_str()).collect();
                write!(f, "selective:{{{}}}", names.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g1() -> PublishScope {
        PublishScope::group("g1")
    }

    // ============== Scope Matrix ==============

    #[test]
    fn test_global_subscriber_receives_global_event() {
        assert!(SubscriptionScope::Global.should_receive(&PublishScope::Global));
    }

    #[test]
    fn test_global_subscriber_ignores_group_event() {
        assert!(!SubscriptionScope::Global.should_receive(&g1()));
    }

    #[test]
    fn test_isolated_subscriber_receives_global_event() {
        assert!(SubscriptionScope::isolated("g2").should_receive(&PublishScope::Global));
    }

    #[test]
    fn test_isolated_subscriber_matches_own_group_only() {
        assert!(SubscriptionScope::isolated("g1").should_receive(&g1()));
        assert!(!SubscriptionScope::isolated("g2").should_receive(&g1()));
    }

    #[test]
    fn test_unrestricted_selective_receives_global_event() {
        assert!(SubscriptionScope::all_groups().should_receive(&PublishScope::Global));
    }

    #[test]
    fn test_unrestricted_selective_receives_any_group() {
        assert!(SubscriptionScope::all_groups().should_receive(&g1()));
        assert!(SubscriptionScope::all_groups().should_receive(&PublishScope::group("g9")));
    }

    #[test]
    fn test_selective_set_receives_global_event() {
        let scope = SubscriptionScope::selective(["g1", "g2"]);
        assert!(scope.should_receive(&PublishScope::Global));
    }

    #[test]
    fn test_selective_set_matches_members_only() {
        let scope = SubscriptionScope::selective(["g1", "g2"]);
        assert!(scope.should_receive(&g1()));
        assert!(scope.should_receive(&PublishScope::group("g2")));
        assert!(!scope.should_receive(&PublishScope::group("g3")));
    }

    // ============== Validation ==============

    #[test]
    fn test_empty_selective_input_means_all_groups() {
        let empty: Vec<GroupId> = Vec::new();
        assert_eq!(SubscriptionScope::selective(empty), SubscriptionScope::Selective(None));
    }

    #[test]
    fn test_isolated_requires_group_id() {
        let err = SubscriptionScope::isolated("").validate().unwrap_err();
        assert!(err.reason.contains("non-empty group id"));
        assert!(SubscriptionScope::isolated("desk-a").validate().is_ok());
    }

    #[test]
    fn test_present_but_empty_selective_set_is_rejected() {
        let scope = SubscriptionScope::Selective(Some(BTreeSet::new()));
        assert!(scope.validate().is_err());
    }

    #[test]
    fn test_selective_set_with_blank_member_is_rejected() {
        let scope = SubscriptionScope::selective(["g1", " "]);
        assert!(scope.validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(SubscriptionScope::Global.to_string(), "global");
        assert_eq!(SubscriptionScope::isolated("a").to_string(), "isolated:a");
        assert_eq!(SubscriptionScope::all_groups().to_string(), "selective:*");
        assert_eq!(
            SubscriptionScope::selective(["b", "a"]).to_string(),
            "selective:{a,b}"
        );
        assert_eq!(PublishScope::group("a").to_string(), "group:a");
    }
}
