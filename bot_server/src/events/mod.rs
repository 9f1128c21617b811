//! Build-lifecycle events derived from classified chat messages.
//!
//! One variant per recognized message shape. The serde representation is the
//! on-disk tracking schema: internally tagged with `event_type`, build ids
//! under `an_build`, regression outcomes under `rt_outcome`.

use serde::{Deserialize, Serialize};

/// A build-lifecycle event extracted from an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum DomainEvent {
    /// The CI server announced a freshly built product build.
    #[serde(rename = "new_build")]
    NewBuild {
        #[serde(rename = "an_build")]
        build_id: String,
        /// Absent when the source message carried no usable branch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
    /// A regression-test run finished and reported its verdict.
    #[serde(rename = "reg_tests_outcome")]
    RegressionOutcome {
        #[serde(rename = "an_build")]
        build_id: String,
        #[serde(rename = "rt_outcome")]
        outcome: String,
    },
    /// The automation tool started a regression-test run on the cluster.
    #[serde(rename = "reg_tests_started")]
    RegressionStarted {
        #[serde(rename = "an_build")]
        build_id: String,
    },
    /// The automation tool finished its regression-test run.
    #[serde(rename = "reg_tests_done")]
    RegressionDone {
        #[serde(rename = "an_build")]
        build_id: String,
    },
}

impl DomainEvent {
    /// The product build this event refers to.
    pub fn build_id(&self) -> &str {
        match self {
            Self::NewBuild { build_id, .. }
            | Self::RegressionOutcome { build_id, .. }
            | Self::RegressionStarted { build_id }
            | Self::RegressionDone { build_id } => build_id,
        }
    }

    /// The branch this event refers to, if the event kind carries one.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Self::NewBuild { branch, .. } => branch.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_build_serializes_to_tracking_schema() {
        let event = DomainEvent::NewBuild {
            build_id: "7".to_string(),
            branch: Some("feature-x".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "new_build");
        assert_eq!(json["an_build"], "7");
        assert_eq!(json["branch"], "feature-x");
    }

    #[test]
    fn test_branch_omitted_when_absent() {
        let event = DomainEvent::NewBuild {
            build_id: "7".to_string(),
            branch: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("branch").is_none());
    }

    #[test]
    fn test_outcome_round_trips() {
        let event = DomainEvent::RegressionOutcome {
            build_id: "42".to_string(),
            outcome: "SUCCESS".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"rt_outcome\":\"SUCCESS\""));
        let back: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
