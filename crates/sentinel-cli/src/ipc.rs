//! The operation surface a real transport would dispatch against.
//!
//! Kept as a plain Rust enum rather than committing to a wire encoding
//! up front: a length-prefixed socket framing layer can sit in front of
//! it later without touching the dispatch logic. `dispatch` is the one
//! piece that actually runs each operation against a [`SentinelDaemon`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sentinel_policy::Policy;
use sentinel_quarantine::QuarantineRecord;
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineOutcome, SentinelDaemon};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcOperation {
    ScanFile { client: String, path: PathBuf },
    ScanBytes { client: String, bytes: Vec<u8> },
    CreatePolicy { policy: Policy },
    MatchPolicy { content_hash: String, url: Option<String>, filename: String },
    ListPolicies,
    DeletePolicy { id: i64 },
    Quarantine { path: PathBuf, reason: String },
    Restore { id: i64, target_path: PathBuf },
    DeleteQuarantined { id: i64 },
    ListQuarantined,
    Health,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcResponse {
    Scanned(Box<PipelineOutcomeSummary>),
    PolicyCreated(Policy),
    PolicyMatched(Option<Policy>),
    Policies(Vec<Policy>),
    PolicyDeleted,
    Quarantined(QuarantineRecord),
    Restored,
    QuarantineDeleted,
    QuarantineList(Vec<QuarantineRecord>),
    Health(HealthReport),
}

/// A JSON-serializable projection of [`PipelineOutcome`] — `Verdict`
/// carries a `Duration` that serializes as millis, so the rest is
/// reshaped to travel over the wire alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcomeSummary {
    pub composite: f64,
    pub level: String,
    pub explanation: String,
    pub matched_policy_id: Option<i64>,
    pub quarantined: bool,
}

impl From<&PipelineOutcome> for PipelineOutcomeSummary {
    fn from(outcome: &PipelineOutcome) -> Self {
        Self {
            composite: outcome.verdict.composite,
            level: format!("{:?}", outcome.verdict.level),
            explanation: outcome.verdict.explanation.clone(),
            matched_policy_id: outcome.matched_policy.as_ref().map(|p| p.id),
            quarantined: outcome.quarantine_record.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub state: ComponentState,
    pub last_checked: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: ComponentState,
    pub components: Vec<ComponentStatus>,
}

/// Runs one operation against the daemon's owned component crates.
///
/// `ScanFile` and `ScanBytes` are the only operations that can fail
/// partway through policy matching or quarantining; every other
/// operation is a single call into its owning crate.
///
/// # Errors
///
/// Propagates whatever the underlying crate returns.
pub fn dispatch(daemon: &mut SentinelDaemon, op: IpcOperation) -> anyhow::Result<IpcResponse> {
    match op {
        IpcOperation::ScanFile { client, path } => {
            let outcome = daemon.process_file(&client, &path)?;
            let summary = PipelineOutcomeSummary::from(&outcome);
            Ok(IpcResponse::Scanned(Box::new(summary)))
        }
        IpcOperation::ScanBytes { client, bytes } => {
            let tmp = tempfile::NamedTempFile::new()?;
            std::fs::write(tmp.path(), &bytes)?;
            let outcome = daemon.process_file(&client, tmp.path())?;
            let summary = PipelineOutcomeSummary::from(&outcome);
            Ok(IpcResponse::Scanned(Box::new(summary)))
        }
        IpcOperation::CreatePolicy { policy } => {
            let created = daemon
                .policy()
                .create_policy(policy)
                .map_err(|e| anyhow::anyhow!("creating policy: {e}"))?;
            Ok(IpcResponse::PolicyCreated(created))
        }
        IpcOperation::MatchPolicy { content_hash, url, filename } => {
            let threat = sentinel_policy::ThreatMetadata {
                url,
                filename,
                content_hash,
                mime_type: None,
                size_bytes: 0,
                rule_names: Vec::new(),
                severity: 0,
            };
            let matched = daemon
                .policy()
                .match_policy(&threat, chrono::Utc::now())
                .map_err(|e| anyhow::anyhow!("matching policy: {e}"))?;
            Ok(IpcResponse::PolicyMatched(matched))
        }
        IpcOperation::ListPolicies => {
            let policies = daemon
                .policy()
                .list_policies()
                .map_err(|e| anyhow::anyhow!("listing policies: {e}"))?;
            Ok(IpcResponse::Policies(policies))
        }
        IpcOperation::DeletePolicy { id } => {
            daemon
                .policy()
                .delete_policy(id)
                .map_err(|e| anyhow::anyhow!("deleting policy {id}: {e}"))?;
            Ok(IpcResponse::PolicyDeleted)
        }
        IpcOperation::Quarantine { path, reason } => {
            let record = daemon
                .quarantine()
                .quarantine(
                    &path,
                    reason,
                    sentinel_quarantine::ThreatLevel::Malicious,
                    0.0,
                    chrono::Utc::now(),
                )
                .map_err(|e| anyhow::anyhow!("quarantining {}: {e}", path.display()))?;
            Ok(IpcResponse::Quarantined(record))
        }
        IpcOperation::Restore { id, target_path } => {
            daemon
                .quarantine()
                .restore(id, &target_path)
                .map_err(|e| anyhow::anyhow!("restoring quarantine record {id}: {e}"))?;
            Ok(IpcResponse::Restored)
        }
        IpcOperation::DeleteQuarantined { id } => {
            daemon
                .quarantine()
                .delete(id)
                .map_err(|e| anyhow::anyhow!("deleting quarantine record {id}: {e}"))?;
            Ok(IpcResponse::QuarantineDeleted)
        }
        IpcOperation::ListQuarantined => {
            let records = daemon
                .quarantine()
                .list()
                .map_err(|e| anyhow::anyhow!("listing quarantine records: {e}"))?;
            Ok(IpcResponse::QuarantineList(records))
        }
        IpcOperation::Health => Ok(IpcResponse::Health(health_check(daemon))),
    }
}

/// Liveness is implicit in this in-process dispatcher (if `dispatch`
/// can run, the event loop is responsive); readiness additionally
/// requires the policy store to answer `list_policies` and the
/// quarantine key file to be present.
fn health_check(daemon: &mut SentinelDaemon) -> HealthReport {
    let now = chrono::Utc::now();
    let mut components = Vec::new();

    let policy_state = match daemon.policy().list_policies() {
        Ok(_) => ComponentState::Healthy,
        Err(e) => {
            components.push(ComponentStatus {
                name: "policy_store".into(),
                state: ComponentState::Unhealthy,
                last_checked: now,
                reason: e.to_string(),
            });
            ComponentState::Unhealthy
        }
    };
    if policy_state == ComponentState::Healthy {
        components.push(ComponentStatus {
            name: "policy_store".into(),
            state: ComponentState::Healthy,
            last_checked: now,
            reason: String::new(),
        });
    }

    let key_present = daemon.quarantine().root().join("encryption.key").exists();
    components.push(ComponentStatus {
        name: "quarantine_key".into(),
        state: if key_present { ComponentState::Healthy } else { ComponentState::Unhealthy },
        last_checked: now,
        reason: if key_present { String::new() } else { "encryption.key missing".into() },
    });

    let overall = if components.iter().all(|c| c.state == ComponentState::Healthy) {
        ComponentState::Healthy
    } else if components.iter().any(|c| c.state == ComponentState::Unhealthy) {
        ComponentState::Degraded
    } else {
        ComponentState::Healthy
    };

    HealthReport { overall, components }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::SentinelConfig;
    use std::io::Write;
    use tempfile::tempdir;

    fn daemon_with_one_file(source_dir: &tempfile::TempDir, quarantine_dir: &tempfile::TempDir) -> (SentinelDaemon, PathBuf) {
        let daemon = SentinelDaemon::temporary(SentinelConfig::default(), quarantine_dir.path()).unwrap();
        let path = source_dir.path().join("sample.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"Hello World\nThis is a safe document.\n").unwrap();
        (daemon, path)
    }

    #[test]
    fn scan_file_dispatches_and_returns_summary() {
        let source_dir = tempdir().unwrap();
        let quarantine_dir = tempdir().unwrap();
        let (mut daemon, path) = daemon_with_one_file(&source_dir, &quarantine_dir);

        let response = dispatch(
            &mut daemon,
            IpcOperation::ScanFile { client: "c1".into(), path },
        )
        .unwrap();

        match response {
            IpcResponse::Scanned(summary) => assert_eq!(summary.level, "Clean"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn list_policies_starts_empty() {
        let quarantine_dir = tempdir().unwrap();
        let mut daemon = SentinelDaemon::temporary(SentinelConfig::default(), quarantine_dir.path()).unwrap();

        let response = dispatch(&mut daemon, IpcOperation::ListPolicies).unwrap();
        match response {
            IpcResponse::Policies(policies) => assert!(policies.is_empty()),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn health_is_healthy_once_quarantine_is_opened() {
        let quarantine_dir = tempdir().unwrap();
        let mut daemon = SentinelDaemon::temporary(SentinelConfig::default(), quarantine_dir.path()).unwrap();

        let response = dispatch(&mut daemon, IpcOperation::Health).unwrap();
        match response {
            IpcResponse::Health(report) => {
                assert_eq!(report.overall, ComponentState::Healthy);
                assert!(report.components.iter().any(|c| c.name == "policy_store"));
                assert!(report.components.iter().any(|c| c.name == "quarantine_key"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
