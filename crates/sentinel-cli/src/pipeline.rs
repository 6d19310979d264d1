//! Composes Orchestrator → VerdictEngine → PolicyGraph.match_policy →
//! QuarantineManager.quarantine → PolicyGraph.record_threat into the
//! full scan pipeline. No single component crate can depend on all the
//! others without creating a cycle, so the composition lives in the
//! binary that depends on all of them instead.

use std::path::Path;

use sha2::{Digest, Sha256};

use sentinel_core::{Sentinel, SentinelConfig, ThreatLevel as CoreThreatLevel, Verdict};
use sentinel_policy::{Action, Policy, PolicyGraph, ThreatMetadata as PolicyThreatMetadata};
use sentinel_quarantine::{QuarantineManager, QuarantineRecord, ThreatLevel as QuarantineThreatLevel};
use sentinel_threatindex::ThreatIndex;

/// What the pipeline did with one file.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub verdict: Verdict,
    pub matched_policy: Option<Policy>,
    pub effective_action: Action,
    pub quarantine_record: Option<QuarantineRecord>,
}

/// Owns every component crate and runs the end-to-end pipeline for one
/// file at a time.
pub struct SentinelDaemon {
    sentinel: Sentinel,
    policy: PolicyGraph,
    quarantine: QuarantineManager,
    threat_index: ThreatIndex,
}

impl SentinelDaemon {
    /// Opens (or creates) every backing store named in `config`.
    ///
    /// # Errors
    ///
    /// Propagates failures opening the policy store or quarantine
    /// directory, or invalid core configuration.
    pub fn open(config: SentinelConfig) -> anyhow::Result<Self> {
        let policy = PolicyGraph::open(&config.policy.db_path)
            .map_err(|e| anyhow::anyhow!("opening policy store: {e}"))?;
        let quarantine = QuarantineManager::open(&config.quarantine.root)
            .map_err(|e| anyhow::anyhow!("opening quarantine directory: {e}"))?;
        let threat_index = ThreatIndex::with_defaults();
        let sentinel = Sentinel::new(config)?;

        Ok(Self {
            sentinel,
            policy,
            quarantine,
            threat_index,
        })
    }

    /// In-memory variant for tests: everything backed by temporary
    /// storage instead of the configured paths.
    pub fn temporary(config: SentinelConfig, quarantine_root: impl Into<std::path::PathBuf>) -> anyhow::Result<Self> {
        let policy = PolicyGraph::temporary().map_err(|e| anyhow::anyhow!("opening policy store: {e}"))?;
        let quarantine = QuarantineManager::temporary(quarantine_root)
            .map_err(|e| anyhow::anyhow!("opening quarantine directory: {e}"))?;
        let threat_index = ThreatIndex::with_defaults();
        let sentinel = Sentinel::new(config)?;

        Ok(Self {
            sentinel,
            policy,
            quarantine,
            threat_index,
        })
    }

    /// Scans `path`, checks for a matching policy override, quarantines
    /// the file when the effective action calls for it, and records a
    /// threat if the verdict was non-clean.
    ///
    /// # Errors
    ///
    /// Propagates I/O, scan, policy, or quarantine errors.
    pub fn process_file(&mut self, client: &str, path: &Path) -> anyhow::Result<PipelineOutcome> {
        let bytes = std::fs::read(path)?;
        let content_hash = hex::encode(Sha256::digest(&bytes));
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let verdict = self.sentinel.scan(client, &filename, &bytes)?;

        let threat_meta = PolicyThreatMetadata {
            url: None,
            filename: filename.clone(),
            content_hash: content_hash.clone(),
            mime_type: None,
            size_bytes: bytes.len() as u64,
            rule_names: Vec::new(),
            severity: severity_for(verdict.level),
        };

        let now = chrono::Utc::now();
        let matched_policy = self
            .policy
            .match_policy(&threat_meta, now)
            .map_err(|e| anyhow::anyhow!("matching policy: {e}"))?;

        let effective_action = matched_policy
            .as_ref()
            .map(|p| p.action)
            .unwrap_or_else(|| default_action_for(verdict.level));

        let mut quarantine_record = None;
        if self.sentinel.config().global.enable_quarantine
            && matches!(effective_action, Action::Quarantine)
            && matches!(verdict.level, CoreThreatLevel::Malicious | CoreThreatLevel::Critical)
        {
            quarantine_record = Some(
                self.quarantine
                    .quarantine(
                        path,
                        verdict.explanation.clone(),
                        to_quarantine_level(verdict.level),
                        verdict.composite,
                        now,
                    )
                    .map_err(|e| anyhow::anyhow!("quarantining file: {e}"))?,
            );
        }

        if !matches!(verdict.level, CoreThreatLevel::Clean) {
            if self.sentinel.config().global.enable_threat_index {
                self.threat_index.record(
                    &content_hash,
                    sentinel_threatindex::ThreatCategory::Unknown,
                    severity_for(verdict.level),
                    now,
                );
            }

            let record = sentinel_policy::ThreatRecord {
                id: 0,
                policy_id: matched_policy.as_ref().map(|p| p.id),
                threat: threat_meta,
                action_taken: effective_action,
                verdict_json: serde_json::to_string(&verdict)?,
                detected_at: now,
            };
            self.policy
                .record_threat(record)
                .map_err(|e| anyhow::anyhow!("recording threat: {e}"))?;
        }

        Ok(PipelineOutcome {
            verdict,
            matched_policy,
            effective_action,
            quarantine_record,
        })
    }

    pub fn policy(&mut self) -> &mut PolicyGraph {
        &mut self.policy
    }

    pub fn quarantine(&mut self) -> &mut QuarantineManager {
        &mut self.quarantine
    }

    pub fn threat_index(&mut self) -> &mut ThreatIndex {
        &mut self.threat_index
    }
}

fn default_action_for(level: CoreThreatLevel) -> Action {
    match level {
        CoreThreatLevel::Clean => Action::Allow,
        CoreThreatLevel::Suspicious => Action::WarnUser,
        CoreThreatLevel::Malicious | CoreThreatLevel::Critical => Action::Quarantine,
    }
}

fn to_quarantine_level(level: CoreThreatLevel) -> QuarantineThreatLevel {
    match level {
        CoreThreatLevel::Clean => QuarantineThreatLevel::Clean,
        CoreThreatLevel::Suspicious => QuarantineThreatLevel::Suspicious,
        CoreThreatLevel::Malicious => QuarantineThreatLevel::Malicious,
        CoreThreatLevel::Critical => QuarantineThreatLevel::Critical,
    }
}

fn severity_for(level: CoreThreatLevel) -> u8 {
    match level {
        CoreThreatLevel::Clean => 1,
        CoreThreatLevel::Suspicious => 4,
        CoreThreatLevel::Malicious => 7,
        CoreThreatLevel::Critical => 10,
    }
}
