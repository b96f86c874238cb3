//! Transitive duplicate clustering.
//!
//! Two objects share a cluster when they are connected by a chain of pairwise
//! duplicate verdicts. Exact-hash groups are merged first; near-duplicate
//! candidate pairs come from an inverted shingle index so only pairs sharing
//! at least one shingle are scored. Pairs with no shared shingle score 0 and
//! can never reach a positive threshold.

use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

use super::fingerprint::Fingerprint;
use super::similarity::jaccard_similarity;

/// Disjoint-set forest with path halving and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Returns the representative of `x`'s set.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merges the sets of `a` and `b`; returns false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            },
        }
        true
    }

    /// Returns every set with more than one member.
    ///
    /// Members are ascending; sets are ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        let mut groups: Vec<Vec<usize>> = by_root
            .into_values()
            .filter(|members| members.len() > 1)
            .collect();
        groups.sort_by_key(|members| members[0]);
        groups
    }
}

/// Groups fingerprints into duplicate clusters.
///
/// Returns index clusters of size greater than one. `cancelled` is polled once
/// per fingerprint; when it returns true the scan stops with
/// [`Error::Cancelled`].
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancelled` reports true during the scan.
pub fn find_clusters(
    fingerprints: &[Fingerprint],
    threshold: f64,
    cancelled: impl Fn() -> bool,
) -> Result<Vec<Vec<usize>>> {
    let mut sets = UnionFind::new(fingerprints.len());

    let mut by_hash: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, fp) in fingerprints.iter().enumerate() {
        if let Some(&first) = by_hash.get(fp.exact_hash.as_str()) {
            sets.union(first, i);
        } else {
            by_hash.insert(fp.exact_hash.as_str(), i);
        }
    }

    let mut postings: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, fp) in fingerprints.iter().enumerate() {
        for shingle in &fp.shingles {
            postings.entry(shingle.as_str()).or_default().push(i);
        }
    }

    for (i, fp) in fingerprints.iter().enumerate() {
        if cancelled() {
            return Err(Error::Cancelled("cleanup scan".to_string()));
        }

        let candidates: BTreeSet<usize> = fp
            .shingles
            .iter()
            .filter_map(|s| postings.get(s.as_str()))
            .flat_map(|ids| ids.iter().copied())
            .filter(|&j| j > i)
            .collect();

        for j in candidates {
            if sets.find(i) == sets.find(j) {
                continue;
            }
            if jaccard_similarity(fp, &fingerprints[j]) >= threshold {
                sets.union(i, j);
            }
        }
    }

    Ok(sets.groups())
}
