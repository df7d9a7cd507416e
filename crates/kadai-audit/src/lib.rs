//! Append-only audit trail of admin status transitions.
//!
//! JSON Lines, one record per applied action, keys sorted. With the hash
//! chain on, each record carries `hash_prev` (the previous record's
//! `hash_self`) and `hash_self` (SHA-256 of its own canonical line with
//! `hash_self` cleared).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use kadai_lifecycle::{AdminAction, OrderStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What the caller knows about one applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEntry {
    pub order_id: String,
    /// Admin session id (never the password or token).
    pub actor: String,
    pub action: AdminAction,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub event_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub order_id: String,
    pub actor: String,
    pub action: AdminAction,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    /// Creates the writer for a fresh log and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Open an existing log (or start one) and continue its chain.
    pub fn resume(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let mut w = Self::new(path, hash_chain)?;
        if w.path.exists() {
            let content = fs::read_to_string(&w.path)
                .with_context(|| format!("read audit log {:?}", w.path))?;
            w.continue_after(last_record(&content)?);
        }
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Number of records appended so far (including resumed ones).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Appends one record while holding an exclusive lock on the log file.
    ///
    /// The chain position is re-read from the file under the lock, so the
    /// daemon and the CLI can append to the same log without forking the
    /// chain. Blocking: async callers run this on the blocking pool.
    pub fn append(&mut self, entry: TransitionEntry) -> Result<TransitionRecord> {
        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log {:?}", self.path))?;
        f.lock_exclusive()
            .with_context(|| format!("lock audit log {:?}", self.path))?;

        let appended = self.append_locked(&mut f, entry);
        // Closing the handle releases the lock as well.
        let _ = FileExt::unlock(&f);
        appended
    }

    fn append_locked(&mut self, f: &mut File, entry: TransitionEntry) -> Result<TransitionRecord> {
        let mut content = String::new();
        f.read_to_string(&mut content)
            .with_context(|| format!("read audit log {:?}", self.path))?;
        self.continue_after(last_record(&content)?);

        let mut rec = TransitionRecord {
            event_id: Uuid::new_v4(),
            seq: self.seq,
            ts_utc: Utc::now(),
            order_id: entry.order_id,
            actor: entry.actor,
            action: entry.action,
            from: entry.from,
            to: entry.to,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = self.last_hash.clone();
            rec.hash_self = Some(compute_record_hash(&rec)?);
        }

        let mut line = canonical_json_line(&rec)?;
        line.push('\n');
        f.write_all(line.as_bytes()).context("write audit line failed")?;
        f.flush().context("flush audit log failed")?;

        self.seq = rec.seq + 1;
        self.last_hash = rec.hash_self.clone();
        Ok(rec)
    }

    fn continue_after(&mut self, last: Option<TransitionRecord>) {
        match last {
            Some(rec) => {
                self.seq = rec.seq + 1;
                self.last_hash = rec.hash_self;
            }
            None => {
                self.seq = 0;
                self.last_hash = None;
            }
        }
    }
}

/// The final record of a log, if it has any.
fn last_record(content: &str) -> Result<Option<TransitionRecord>> {
    let Some((i, line)) = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .last()
    else {
        return Ok(None);
    };
    let rec = serde_json::from_str(line.trim())
        .with_context(|| format!("parse audit record at line {}", i + 1))?;
    Ok(Some(rec))
}

/// Sorted keys, compact. One record == one line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit record failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash of the canonical line with `hash_self` cleared.
pub fn compute_record_hash(rec: &TransitionRecord) -> Result<String> {
    let mut clone = rec.clone();
    clone.hash_self = None;
    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Checks sequence continuity, `hash_prev` linkage and every `hash_self`.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let rec: TransitionRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit record at line {}", i + 1))?;

        if rec.seq != count as u64 {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!("seq gap: expected {}, got {}", count, rec.seq),
            });
        }
        count += 1;

        if rec.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, rec.hash_prev
                ),
            });
        }

        if let Some(claimed) = rec.hash_self.as_deref() {
            let recomputed = compute_record_hash(&rec)?;
            if claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = rec.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: count })
}
