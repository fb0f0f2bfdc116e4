//! Per-session memory of user trust/block decisions.
//!
//! Entries are volatile: they live for one interactive session and are
//! never persisted unless explicitly exported. The store is constructed
//! per session and injected into the coordinator, which owns the only
//! write path.

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use squall_core::{Error, Result};

/// A remembered user decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyDecision {
    /// Matching commands skip the confirmation prompt
    Trust,
    /// Matching commands are refused outright
    Block,
}

/// How a policy pattern is matched. Recorded with the entry so lookup
/// uses the same semantics the pattern was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyPatternKind {
    /// Exact command text, or a prefix when the pattern ends in `*`
    Literal,
    /// Regular expression (operator auto-approve/always-block patterns)
    Regex,
}

/// One session policy entry, keyed by its literal pattern text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicyEntry {
    pub pattern: String,
    pub kind: PolicyPatternKind,
    pub decision: PolicyDecision,
    pub created_at: String,
}

/// In-memory store of session policy entries.
///
/// Interior mutability: the engine may be driven from a multi-threaded
/// runtime, so `remember`/`lookup` pairs are guarded by a mutex.
#[derive(Debug, Default)]
pub struct SessionPolicyStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, SessionPolicyEntry>,
    // Compiled regex entries, keyed by pattern text. Rebuilt on import.
    compiled: HashMap<String, Regex>,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn literal_matches(pattern: &str, command: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        command.starts_with(prefix.trim_end())
    } else {
        command == pattern
    }
}

impl SessionPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a literal pattern. Idempotent upsert keyed by pattern
    /// text; last write wins.
    pub fn remember(&self, pattern: impl Into<String>, decision: PolicyDecision) {
        let pattern = pattern.into();
        let mut inner = self.inner.lock().expect("session policy lock poisoned");
        inner.compiled.remove(&pattern);
        inner.entries.insert(
            pattern.clone(),
            SessionPolicyEntry {
                pattern,
                kind: PolicyPatternKind::Literal,
                decision,
                created_at: timestamp(),
            },
        );
    }

    /// Remember a regex pattern (operator config seeding). Rejects
    /// patterns that fail to compile.
    pub fn remember_regex(&self, pattern: impl Into<String>, decision: PolicyDecision) -> Result<()> {
        let pattern = pattern.into();
        let re = Regex::new(&pattern)
            .map_err(|e| Error::Configuration(format!("invalid policy pattern '{}': {}", pattern, e)))?;

        let mut inner = self.inner.lock().expect("session policy lock poisoned");
        inner.compiled.insert(pattern.clone(), re);
        inner.entries.insert(
            pattern.clone(),
            SessionPolicyEntry {
                pattern,
                kind: PolicyPatternKind::Regex,
                decision,
                created_at: timestamp(),
            },
        );
        Ok(())
    }

    /// Look up the session decision for a command.
    ///
    /// Trust patterns are checked before block patterns, so a user can
    /// locally override a prior block within the same session. This is
    /// the one place policy can silently widen permissions; the ordering
    /// is deliberate.
    pub fn lookup(&self, command: &str) -> Option<PolicyDecision> {
        let inner = self.inner.lock().expect("session policy lock poisoned");

        for wanted in [PolicyDecision::Trust, PolicyDecision::Block] {
            let hit = inner.entries.values().filter(|entry| entry.decision == wanted).any(|entry| {
                match entry.kind {
                    PolicyPatternKind::Literal => literal_matches(&entry.pattern, command),
                    PolicyPatternKind::Regex => inner
                        .compiled
                        .get(&entry.pattern)
                        .is_some_and(|re| re.is_match(command)),
                }
            });
            if hit {
                return Some(wanted);
            }
        }

        None
    }

    /// The pattern text of the matching block entry, for refusal messages.
    pub fn matching_block_pattern(&self, command: &str) -> Option<String> {
        let inner = self.inner.lock().expect("session policy lock poisoned");
        inner
            .entries
            .values()
            .filter(|entry| entry.decision == PolicyDecision::Block)
            .find(|entry| match entry.kind {
                PolicyPatternKind::Literal => literal_matches(&entry.pattern, command),
                PolicyPatternKind::Regex => {
                    inner.compiled.get(&entry.pattern).is_some_and(|re| re.is_match(command))
                }
            })
            .map(|entry| entry.pattern.clone())
    }

    /// Wipe all entries. Called at session end, never implicitly.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("session policy lock poisoned");
        inner.entries.clear();
        inner.compiled.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session policy lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, for explicit session handoff.
    pub fn export(&self) -> Vec<SessionPolicyEntry> {
        let inner = self.inner.lock().expect("session policy lock poisoned");
        let mut entries: Vec<SessionPolicyEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.pattern.cmp(&b.pattern)));
        entries
    }

    /// Restore exported entries. Regex entries that no longer compile are
    /// rejected rather than silently dropped.
    pub fn import(&self, entries: Vec<SessionPolicyEntry>) -> Result<()> {
        let mut inner = self.inner.lock().expect("session policy lock poisoned");
        for entry in entries {
            if entry.kind == PolicyPatternKind::Regex {
                let re = Regex::new(&entry.pattern).map_err(|e| {
                    Error::Configuration(format!("invalid policy pattern '{}': {}", entry.pattern, e))
                })?;
                inner.compiled.insert(entry.pattern.clone(), re);
            }
            inner.entries.insert(entry.pattern.clone(), entry);
        }
        Ok(())
    }
}
