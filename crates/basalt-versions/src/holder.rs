//! Per-member region version tracking with exception ranges.
//!
//! A holder remembers the highest region version applied from one member,
//! plus the ranges below it that have not arrived yet. Versions are
//! recorded in any order; gaps close as late versions are backfilled.

use serde::{Deserialize, Serialize};

/// An inclusive range of region versions that have not been received.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionException {
    pub from: u64,
    pub to: u64,
}

impl VersionException {
    pub fn contains(&self, version: u64) -> bool {
        self.from <= version && version <= self.to
    }

    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

/// Highest version plus gaps for a single member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionVersionHolder {
    version: u64,
    exceptions: Vec<VersionException>,
}

impl RegionVersionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A holder that has seen every version up to and including `version`.
    pub fn with_version(version: u64) -> Self {
        RegionVersionHolder {
            version,
            exceptions: Vec::new(),
        }
    }

    /// Highest version recorded.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Outstanding gaps, ascending.
    pub fn exceptions(&self) -> &[VersionException] {
        &self.exceptions
    }

    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    /// True if `version` has been recorded. Version 0 is always contained.
    pub fn contains(&self, version: u64) -> bool {
        version == 0
            || (version <= self.version && !self.exceptions.iter().any(|e| e.contains(version)))
    }

    /// Record `version`. Returns false if it had already been recorded.
    pub fn record_version(&mut self, version: u64) -> bool {
        if self.contains(version) {
            return false;
        }
        if version > self.version {
            if version > self.version + 1 {
                self.exceptions.push(VersionException {
                    from: self.version + 1,
                    to: version - 1,
                });
            }
            self.version = version;
            return true;
        }

        let Some(index) = self.exceptions.iter().position(|e| e.contains(version)) else {
            return false;
        };
        let gap = self.exceptions[index];
        let below = VersionException {
            from: gap.from,
            to: version - 1,
        };
        let above = VersionException {
            from: version + 1,
            to: gap.to,
        };
        self.exceptions.remove(index);
        let mut at = index;
        for part in [below, above] {
            if !part.is_empty() {
                self.exceptions.insert(at, part);
                at += 1;
            }
        }
        true
    }

    /// Missing versions in `1..=limit`, ascending.
    fn missing_upto(&self, limit: u64) -> Vec<VersionException> {
        let mut missing: Vec<VersionException> = self
            .exceptions
            .iter()
            .filter(|e| e.from <= limit)
            .map(|e| VersionException {
                from: e.from,
                to: e.to.min(limit),
            })
            .collect();
        if limit > self.version {
            missing.push(VersionException {
                from: self.version + 1,
                to: limit,
            });
        }
        missing
    }

    /// Absorb every version recorded by `other`.
    pub fn merge(&mut self, other: &RegionVersionHolder) {
        let limit = self.version.max(other.version);
        let mine = self.missing_upto(limit);
        let theirs = other.missing_upto(limit);
        self.exceptions = intersect(&mine, &theirs);
        self.version = limit;
    }

    /// True if every version recorded by `other` is also recorded here.
    pub fn dominates(&self, other: &RegionVersionHolder) -> bool {
        let mine = self.missing_upto(other.version);
        intersect(&mine, &other.missing_upto(other.version)) == mine
    }
}

fn intersect(a: &[VersionException], b: &[VersionException]) -> Vec<VersionException> {
    let mut out: Vec<VersionException> = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let from = a[i].from.max(b[j].from);
        let to = a[i].to.min(b[j].to);
        if from <= to {
            match out.last_mut() {
                Some(last) if last.to + 1 == from => last.to = to,
                _ => out.push(VersionException { from, to }),
            }
        }
        if a[i].to < b[j].to {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}
