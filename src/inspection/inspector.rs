//! Per-request decision pipeline.
//!
//! # Responsibilities
//! - Deny sources with an active block before looking at the request
//! - Run the pattern matcher over every parameter value
//! - Count suspicious requests per source and block on the threshold
//! - Invoke the continuation and log its outcome
//!
//! # Design Decisions
//! - "Re-check block, append, count, decide, block" runs under the source's
//!   activity entry lock, so one escalation yields exactly one block
//! - The request that crosses the threshold is itself denied
//! - Requests from a blocked source never touch its activity record
//! - The policy can be swapped at runtime; tracked state is kept

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::config::InspectionConfig;
use crate::detection::{normalize, Detector, PatternMatcher};
use crate::inspection::descriptor::{Params, RequestDescriptor};
use crate::inspection::error::DownstreamError;
use crate::inspection::response::{
    retry_secs, Rejection, ResponseStatus, ValidationRejection, Verdict,
};
use crate::observability::metrics;
use crate::observability::security_log::{EventFields, EventKind, Level, SecurityLog};
use crate::tracking::{ActivityTracker, BlockRegistry, BlockStatus};

/// Thresholds driving the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectionPolicy {
    /// When false requests are evaluated and logged but never tracked or blocked.
    pub enabled: bool,
    pub threshold: usize,
    pub window: Duration,
    pub block_duration: Duration,
}

impl Default for InspectionPolicy {
    fn default() -> Self {
        Self::from(&InspectionConfig::default())
    }
}

impl From<&InspectionConfig> for InspectionPolicy {
    fn from(config: &InspectionConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.threshold,
            window: config.window(),
            block_duration: config.block_duration(),
        }
    }
}

/// What the pipeline concluded about one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectionOutcome {
    pub blocked: bool,
    pub ttl: Option<Duration>,
    pub suspicious: bool,
    /// Field name → normalized text that matched.
    pub matched_fields: BTreeMap<String, String>,
    pub activity_count: Option<usize>,
}

/// Outcome plus the response decision.
#[derive(Debug)]
pub struct Inspection<R> {
    pub outcome: InspectionOutcome,
    pub verdict: Verdict<R>,
}

enum Escalation {
    Flagged { count: usize },
    Escalated { count: usize },
    AlreadyBlocked { ttl: Duration },
}

/// Shared request inspector. Construct once and share behind an `Arc`.
pub struct RequestInspector {
    policy: ArcSwap<InspectionPolicy>,
    matcher: PatternMatcher,
    activity: ActivityTracker,
    blocks: BlockRegistry,
    log: SecurityLog,
}

impl RequestInspector {
    pub fn new(policy: InspectionPolicy, log: SecurityLog) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            matcher: PatternMatcher::default(),
            activity: ActivityTracker::new(),
            blocks: BlockRegistry::new(),
            log,
        }
    }

    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn policy(&self) -> InspectionPolicy {
        **self.policy.load()
    }

    /// Replace the policy. Activity and blocks already recorded are kept.
    pub fn update_policy(&self, policy: InspectionPolicy) {
        tracing::info!(
            enabled = policy.enabled,
            threshold = policy.threshold,
            window_secs = policy.window.as_secs(),
            block_secs = policy.block_duration.as_secs(),
            "Inspection policy updated"
        );
        self.policy.store(policy.into());
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn blocks(&self) -> &BlockRegistry {
        &self.blocks
    }

    pub fn log(&self) -> &SecurityLog {
        &self.log
    }

    /// Run the pipeline for `request`, calling `next` only if the request may proceed.
    pub async fn inspect<F, Fut, R>(&self, request: &RequestDescriptor, next: F) -> Inspection<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, DownstreamError>>,
        R: ResponseStatus,
    {
        let policy = self.policy();
        let now = request.received;
        let mut outcome = InspectionOutcome::default();

        if policy.enabled {
            if let BlockStatus::Blocked { ttl } = self.blocks.check_blocked(&request.source, now) {
                return self.deny_blocked(request, outcome, ttl);
            }
        }

        outcome.matched_fields = self.evaluate(&request.params);
        outcome.suspicious = !outcome.matched_fields.is_empty();

        if outcome.suspicious {
            metrics::record_suspicious();

            if !policy.enabled {
                self.log_suspicious(request, &outcome);
                return self.forward(request, outcome, next).await;
            }

            match self.escalate(&request.source, now, &policy) {
                Escalation::AlreadyBlocked { ttl } => {
                    return self.deny_blocked(request, outcome, ttl);
                }
                Escalation::Flagged { count } => {
                    outcome.activity_count = Some(count);
                    self.log_suspicious(request, &outcome);
                }
                Escalation::Escalated { count } => {
                    outcome.activity_count = Some(count);
                    self.log_suspicious(request, &outcome);
                    return self.deny_escalated(request, outcome, &policy);
                }
            }
        }

        self.forward(request, outcome, next).await
    }

    /// Field → matched text for every parameter with a suspicious value.
    ///
    /// For a repeated field the first matching value is kept, so the record
    /// points at the earliest hit rather than the last.
    pub fn evaluate(&self, params: &Params) -> BTreeMap<String, String> {
        let mut matches = BTreeMap::new();
        for (name, values) in params.iter() {
            // The SQL rule set includes the generic rules.
            let hit = values
                .iter()
                .find(|value| self.matcher.is_sql_injection(value));
            if let Some(value) = hit {
                matches.insert(name.to_string(), normalize(value));
            }
        }
        matches
    }

    /// Check one parameter inside a handler, logging a `validation` event on a match.
    pub fn validate_param(
        &self,
        request: &RequestDescriptor,
        field: &str,
        detector: Detector,
    ) -> Result<(), ValidationRejection> {
        for value in request.params.get_all(field) {
            if let Some(rule) = self.matcher.first_match(detector, value) {
                self.log.emit(
                    Level::Warning,
                    EventKind::Validation,
                    EventFields {
                        field: Some(field.to_string()),
                        reason: Some(rule.to_string()),
                        ..EventFields::for_request(request)
                    },
                );
                return Err(ValidationRejection {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    fn escalate(&self, source: &str, now: Instant, policy: &InspectionPolicy) -> Escalation {
        self.activity.with_record(source, |record| {
            // A sibling request may have blocked the source since the first check.
            if let BlockStatus::Blocked { ttl } = self.blocks.check_blocked(source, now) {
                return Escalation::AlreadyBlocked { ttl };
            }

            let count = record.record(now, policy.window);
            if count >= policy.threshold {
                self.blocks.block(source, now, policy.block_duration);
                Escalation::Escalated { count }
            } else {
                Escalation::Flagged { count }
            }
        })
    }

    async fn forward<F, Fut, R>(
        &self,
        request: &RequestDescriptor,
        outcome: InspectionOutcome,
        next: F,
    ) -> Inspection<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, DownstreamError>>,
        R: ResponseStatus,
    {
        match next().await {
            Ok(response) => {
                self.log.emit(
                    Level::Info,
                    EventKind::Request,
                    EventFields {
                        status: Some(response.status_code()),
                        suspicious: Some(outcome.suspicious),
                        ..EventFields::for_request(request)
                    },
                );
                metrics::record_verdict(if outcome.suspicious { "flagged" } else { "forwarded" });
                Inspection {
                    outcome,
                    verdict: Verdict::Forward(response),
                }
            }
            Err(e) => {
                self.log.emit(
                    Level::Error,
                    EventKind::UnhandledError,
                    EventFields {
                        status: Some(Rejection::InternalError.status().as_u16()),
                        error: Some(e.detail()),
                        ..EventFields::for_request(request)
                    },
                );
                metrics::record_downstream_failure();
                metrics::record_verdict("error");
                Inspection {
                    outcome,
                    verdict: Verdict::Reject(Rejection::InternalError),
                }
            }
        }
    }

    fn deny_blocked<R>(
        &self,
        request: &RequestDescriptor,
        mut outcome: InspectionOutcome,
        ttl: Duration,
    ) -> Inspection<R> {
        self.log.emit(
            Level::Warning,
            EventKind::Blocked,
            EventFields {
                ttl_secs: Some(retry_secs(ttl)),
                ..EventFields::for_request(request)
            },
        );
        metrics::record_verdict("blocked");

        outcome.blocked = true;
        outcome.ttl = Some(ttl);
        Inspection {
            outcome,
            verdict: Verdict::Reject(Rejection::Blocked { ttl }),
        }
    }

    fn deny_escalated<R>(
        &self,
        request: &RequestDescriptor,
        mut outcome: InspectionOutcome,
        policy: &InspectionPolicy,
    ) -> Inspection<R> {
        self.log.emit(
            Level::Error,
            EventKind::IdsBlock,
            EventFields {
                reason: Some("threshold_exceeded".to_string()),
                count: outcome.activity_count,
                window_secs: Some(policy.window.as_secs()),
                block_secs: Some(policy.block_duration.as_secs()),
                ..EventFields::for_request(request)
            },
        );
        metrics::record_block();
        metrics::record_verdict("escalated");

        outcome.blocked = true;
        outcome.ttl = Some(policy.block_duration);
        Inspection {
            outcome,
            verdict: Verdict::Reject(Rejection::Escalated),
        }
    }

    fn log_suspicious(&self, request: &RequestDescriptor, outcome: &InspectionOutcome) {
        self.log.emit(
            Level::Warning,
            EventKind::Suspicious,
            EventFields {
                matches: Some(outcome.matched_fields.clone()),
                count: outcome.activity_count,
                ..EventFields::for_request(request)
            },
        );
    }
}
