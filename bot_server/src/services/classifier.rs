//! Message classification — the rule catalog and the matcher over it.
//!
//! Rules are tried in declared order. The first rule whose sender and
//! first-line pattern both match wins; its validator then either extracts a
//! [`DomainEvent`] or rejects the message. Validation failure never falls
//! through to a later rule.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::events::DomainEvent;

static NEW_BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^|>]+\|Build product-build #([0-9]+)>, branch ([A-Za-z0-9_./-]+): (.+)")
        .unwrap()
});
static RT_OUTCOME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<[^|>]+\|Regression tests #[0-9]+> for build ([A-Za-z0-9_./-]+) finished, outcome: (.+)",
    )
    .unwrap()
});
static RT_STARTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Playbook regression_tests\.yaml \*STARTED\* at [0-9.]+").unwrap());
static RT_DONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Playbook regression_tests\.yaml \*DONE\* at [0-9.]+").unwrap());
static BUILD_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Product build: ([A-Za-z0-9_./-]+)").unwrap());

/// Concrete sender identities for the catalog's sender slots, from config.
#[derive(Debug, Clone)]
pub struct SenderIds {
    /// The CI server's chat identity (build and regression-outcome messages).
    pub ci: String,
    /// The automation tool's chat identity (playbook status blocks).
    pub automation: String,
}

/// Which configured sender a rule expects.
#[derive(Debug, Clone, Copy)]
enum SenderSlot {
    Ci,
    Automation,
}

/// Result of classifying one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A rule matched and its validator accepted the message.
    Matched(DomainEvent),
    /// A rule matched but its validator declined — recognized shape,
    /// intentionally ignored. Must not fall through to command handling.
    Rejected(&'static str),
    /// No rule's sender+pattern matched; the text may be a direct command.
    NoMatch,
}

struct Rule {
    kind: &'static str,
    sender: SenderSlot,
    pattern: &'static LazyLock<Regex>,
    validate: fn(&[&str], &Captures) -> Result<DomainEvent, &'static str>,
}

static RULES: &[Rule] = &[
    Rule {
        kind: "new_build",
        sender: SenderSlot::Ci,
        pattern: &NEW_BUILD_RE,
        validate: validate_new_build,
    },
    Rule {
        kind: "reg_tests_outcome",
        sender: SenderSlot::Ci,
        pattern: &RT_OUTCOME_RE,
        validate: validate_rt_outcome,
    },
    Rule {
        kind: "reg_tests_started",
        sender: SenderSlot::Automation,
        pattern: &RT_STARTED_RE,
        validate: validate_rt_started,
    },
    Rule {
        kind: "reg_tests_done",
        sender: SenderSlot::Automation,
        pattern: &RT_DONE_RE,
        validate: validate_rt_done,
    },
];

fn validate_new_build(_lines: &[&str], caps: &Captures) -> Result<DomainEvent, &'static str> {
    let branch = &caps[2];
    if branch.starts_with("release") {
        return Err("release branch, the CI server triggers regression tests itself");
    }
    if &caps[3] != "SUCCESS" {
        return Err("failed build, no regression test needed");
    }
    Ok(DomainEvent::NewBuild {
        build_id: caps[1].to_string(),
        branch: Some(branch.to_string()),
    })
}

fn validate_rt_outcome(_lines: &[&str], caps: &Captures) -> Result<DomainEvent, &'static str> {
    Ok(DomainEvent::RegressionOutcome {
        build_id: caps[1].to_string(),
        outcome: caps[2].to_string(),
    })
}

// The automation sender posts multi-line status blocks; the build id sits on
// a fixed, rule-specific line, not the first one.
fn validate_rt_started(lines: &[&str], _caps: &Captures) -> Result<DomainEvent, &'static str> {
    let build_id = build_id_on_line(lines, 2)
        .ok_or("unexpected third line of a regression-started message")?;
    Ok(DomainEvent::RegressionStarted { build_id })
}

fn validate_rt_done(lines: &[&str], _caps: &Captures) -> Result<DomainEvent, &'static str> {
    let build_id =
        build_id_on_line(lines, 1).ok_or("unexpected second line of a regression-done message")?;
    Ok(DomainEvent::RegressionDone { build_id })
}

fn build_id_on_line(lines: &[&str], index: usize) -> Option<String> {
    let line = lines.get(index)?.trim();
    let caps = BUILD_LINE_RE.captures(line)?;
    Some(caps[1].to_string())
}

/// Classify one inbound message against the rule catalog.
pub fn classify(senders: &SenderIds, sender: &str, text: &str) -> Classification {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.first().copied().unwrap_or("");

    for rule in RULES {
        let expected = match rule.sender {
            SenderSlot::Ci => &senders.ci,
            SenderSlot::Automation => &senders.automation,
        };
        if sender != expected {
            continue;
        }
        if let Some(caps) = rule.pattern.captures(first) {
            return match (rule.validate)(&lines, &caps) {
                Ok(event) => Classification::Matched(event),
                Err(reason) => {
                    tracing::debug!(rule = rule.kind, reason, "message recognized but rejected");
                    Classification::Rejected(reason)
                }
            };
        }
    }

    Classification::NoMatch
}

#[cfg(test)]
mod tests {
    use super::*;

    const CI: &str = "B_CISERVER";
    const AUTOMATION: &str = "B_AUTOMATION";

    fn senders() -> SenderIds {
        SenderIds {
            ci: CI.to_string(),
            automation: AUTOMATION.to_string(),
        }
    }

    const NEW_BUILD_OK: &str =
        "<http://ci.example.com/job/product-build/7/|Build product-build #7>, branch feature-x: SUCCESS";

    fn started_block(build_line: &str) -> String {
        format!("Playbook regression_tests.yaml *STARTED* at 10.0.0.4\nhost: cluster-dev\n{build_line}")
    }

    #[test]
    fn test_new_build_matched() {
        let got = classify(&senders(), CI, NEW_BUILD_OK);
        assert_eq!(
            got,
            Classification::Matched(DomainEvent::NewBuild {
                build_id: "7".to_string(),
                branch: Some("feature-x".to_string()),
            })
        );
    }

    #[test]
    fn test_sender_mismatch_is_no_match() {
        // Content matches perfectly for each kind; wrong sender must never match.
        assert_eq!(classify(&senders(), AUTOMATION, NEW_BUILD_OK), Classification::NoMatch);
        assert_eq!(
            classify(
                &senders(),
                AUTOMATION,
                "<http://ci.example.com/job/run-regression-tests/3/|Regression tests #3> for build 7 finished, outcome: SUCCESS",
            ),
            Classification::NoMatch
        );
        assert_eq!(
            classify(&senders(), CI, &started_block("Product build: 7")),
            Classification::NoMatch
        );
        assert_eq!(
            classify(
                &senders(),
                CI,
                "Playbook regression_tests.yaml *DONE* at 10.0.0.4\nProduct build: 7",
            ),
            Classification::NoMatch
        );
        assert_eq!(classify(&senders(), "U_SOMEBODY", NEW_BUILD_OK), Classification::NoMatch);
    }

    #[test]
    fn test_release_branch_rejected_not_matched() {
        let text =
            "<http://ci.example.com/job/product-build/9/|Build product-build #9>, branch release-2.4: SUCCESS";
        match classify(&senders(), CI, text) {
            Classification::Rejected(reason) => assert!(reason.contains("release")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_build_rejected() {
        let text =
            "<http://ci.example.com/job/product-build/9/|Build product-build #9>, branch feature-x: FAILURE";
        assert!(matches!(classify(&senders(), CI, text), Classification::Rejected(_)));
    }

    #[test]
    fn test_regression_outcome_matched() {
        let text =
            "<http://ci.example.com/job/run-regression-tests/3/|Regression tests #3> for build 7 finished, outcome: FAILURE";
        assert_eq!(
            classify(&senders(), CI, text),
            Classification::Matched(DomainEvent::RegressionOutcome {
                build_id: "7".to_string(),
                outcome: "FAILURE".to_string(),
            })
        );
    }

    #[test]
    fn test_regression_started_reads_third_line() {
        let got = classify(&senders(), AUTOMATION, &started_block("Product build: feature-x"));
        assert_eq!(
            got,
            Classification::Matched(DomainEvent::RegressionStarted {
                build_id: "feature-x".to_string(),
            })
        );
    }

    #[test]
    fn test_regression_started_missing_build_line_rejected() {
        // One-line message: the expected third line is absent entirely.
        let one_line = "Playbook regression_tests.yaml *STARTED* at 10.0.0.4";
        assert!(matches!(
            classify(&senders(), AUTOMATION, one_line),
            Classification::Rejected(_)
        ));
        // Three lines, but the third is not a build line.
        assert!(matches!(
            classify(&senders(), AUTOMATION, &started_block("something else")),
            Classification::Rejected(_)
        ));
    }

    #[test]
    fn test_regression_done_reads_second_line() {
        let text = "Playbook regression_tests.yaml *DONE* at 10.0.0.4\nProduct build: feature-x";
        assert_eq!(
            classify(&senders(), AUTOMATION, text),
            Classification::Matched(DomainEvent::RegressionDone {
                build_id: "feature-x".to_string(),
            })
        );
    }

    #[test]
    fn test_regression_done_missing_build_line_rejected() {
        let text = "Playbook regression_tests.yaml *DONE* at 10.0.0.4";
        assert!(matches!(
            classify(&senders(), AUTOMATION, text),
            Classification::Rejected(_)
        ));
    }

    #[test]
    fn test_unrecognized_text_is_no_match() {
        assert_eq!(classify(&senders(), CI, "list"), Classification::NoMatch);
        assert_eq!(classify(&senders(), "U_SOMEBODY", "clear"), Classification::NoMatch);
        assert_eq!(classify(&senders(), CI, ""), Classification::NoMatch);
    }
}
