// src/diversity.rs
//! Diversity reduction: cluster near-duplicate documents and keep one
//! representative per cluster.
//!
//! Greedy and order-dependent. Documents are visited by descending relevance, so
//! the best-scored member of a cluster becomes its representative. For each
//! unclaimed later document:
//!
//! - title similarity `> title_threshold` (default 0.85) → merge
//!   ("same headline, different outlet"); this check wins over the semantic one;
//! - else embedding cosine `>= semantic_threshold` (default 0.70) → merge
//!   ("different headline, same event").
//!
//! Comparisons are always against the representative, never against its
//! children, so clusters form a forest of depth one. Pairwise cost is O(n²),
//! fine for the tens-to-hundreds of documents of a run.

use metrics::counter;
use serde::Deserialize;
use tracing::{debug, info};

use crate::document::Document;
use crate::embed::cosine_similarity;

pub const DEFAULT_TITLE_THRESHOLD: f32 = 0.85;
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.70;

/// Edit-distance ratio used for titles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMetric {
    /// `2·LCS / (|a| + |b|)`: insert/delete edit ratio.
    #[default]
    Indel,
    /// `1 − levenshtein / max(|a|, |b|)`.
    Levenshtein,
    JaroWinkler,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DiversityConfig {
    #[serde(default = "default_title_threshold")]
    pub title_threshold: f32,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
    #[serde(default)]
    pub title_metric: TitleMetric,
}

fn default_title_threshold() -> f32 {
    DEFAULT_TITLE_THRESHOLD
}
fn default_semantic_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            title_threshold: DEFAULT_TITLE_THRESHOLD,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            title_metric: TitleMetric::default(),
        }
    }
}

/// Why a document joined a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeReason {
    Title,
    Semantic,
}

#[derive(Debug, Clone, Default)]
pub struct DiversityReducer {
    cfg: DiversityConfig,
}

impl DiversityReducer {
    pub fn new(cfg: DiversityConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DiversityConfig {
        &self.cfg
    }

    /// Title similarity in [0,1]; 0 when either title is blank.
    pub fn title_similarity(&self, a: &str, b: &str) -> f32 {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        match self.cfg.title_metric {
            TitleMetric::Indel => indel_ratio(&a, &b),
            TitleMetric::Levenshtein => strsim::normalized_levenshtein(&a, &b) as f32,
            TitleMetric::JaroWinkler => strsim::jaro_winkler(&a, &b) as f32,
        }
    }

    /// Decide whether `candidate` belongs in `representative`'s cluster.
    pub fn should_merge(&self, representative: &Document, candidate: &Document) -> Option<MergeReason> {
        if self.title_similarity(&representative.title, &candidate.title) > self.cfg.title_threshold {
            return Some(MergeReason::Title);
        }
        let semantic = match (&representative.embedding, &candidate.embedding) {
            (Some(a), Some(b)) => cosine_similarity(a, b),
            _ => 0.0,
        };
        (semantic >= self.cfg.semantic_threshold).then_some(MergeReason::Semantic)
    }

    /// Collapse near-duplicates. Every input document ends up exactly once:
    /// either as a returned representative or inside one representative's
    /// `merged_children`. Representatives keep their relative input order.
    pub fn reduce(&self, mut docs: Vec<Document>) -> Vec<Document> {
        // Stable: equal scores keep caller order.
        docs.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

        let n = docs.len();
        let mut claimed = vec![false; n];
        let mut clusters: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut by_title = 0usize;
        let mut by_semantic = 0usize;

        for i in 0..n {
            if claimed[i] {
                continue;
            }
            claimed[i] = true;
            let mut members = Vec::new();
            for j in (i + 1)..n {
                if claimed[j] {
                    continue;
                }
                if let Some(reason) = self.should_merge(&docs[i], &docs[j]) {
                    claimed[j] = true;
                    members.push(j);
                    match reason {
                        MergeReason::Title => by_title += 1,
                        MergeReason::Semantic => by_semantic += 1,
                    }
                    debug!(
                        target: "diversity",
                        representative = %docs[i].id,
                        merged = %docs[j].id,
                        ?reason,
                        "merged near-duplicate"
                    );
                }
            }
            clusters.push((i, members));
        }

        let mut slots: Vec<Option<Document>> = docs.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(clusters.len());
        for (rep_idx, members) in clusters {
            let Some(mut rep) = slots[rep_idx].take() else {
                continue;
            };
            for m in members {
                if let Some(mut child) = slots[m].take() {
                    let grandchildren = std::mem::take(&mut child.merged_children);
                    rep.merged_children.push(child);
                    rep.merged_children.extend(grandchildren);
                }
            }
            out.push(rep);
        }

        let merged = by_title + by_semantic;
        counter!("gatekeeper_documents_merged_total").increment(merged as u64);
        info!(
            target: "diversity",
            input = n,
            representatives = out.len(),
            by_title,
            by_semantic,
            "diversity reduction done"
        );
        out
    }
}

/// Insert/delete edit ratio: `2·LCS(a, b) / (|a| + |b|)` over chars.
pub fn indel_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let lcs = prev[b.len()];
    (2 * lcs) as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn doc(id: &str, title: &str, score: f32) -> Document {
        Document::new(id, title, "").with_relevance(score)
    }

    fn ids(out: &[Document]) -> Vec<String> {
        out.iter().map(|d| d.id.clone()).collect()
    }

    fn all_ids(out: &[Document]) -> Vec<String> {
        let mut v = Vec::new();
        for r in out {
            v.push(r.id.clone());
            for c in &r.merged_children {
                assert!(c.merged_children.is_empty(), "depth must be one");
                v.push(c.id.clone());
            }
        }
        v
    }

    #[test]
    fn indel_ratio_known_values() {
        assert!((indel_ratio("abc", "abc") - 1.0).abs() < 1e-6);
        assert_eq!(indel_ratio("abc", "xyz"), 0.0);
        // LCS("kitten", "sitting") = 4 → 8/13
        assert!((indel_ratio("kitten", "sitting") - 8.0 / 13.0).abs() < 1e-6);
    }

    #[test]
    fn same_headline_different_outlet_merges_without_embeddings() {
        let r = DiversityReducer::default();
        let a = Document::new("a", "Tesla Optimus Delayed Again", "Production slips to next year.")
            .with_relevance(0.9);
        let b = Document::new(
            "b",
            "Tesla's Optimus Robot Delayed, Again",
            "Unrelated text about supply chains in Europe.",
        )
        .with_relevance(0.8);
        assert!(r.title_similarity(&a.title, &b.title) > 0.85);
        let out = r.reduce(vec![a, b]);
        assert_eq!(ids(&out), vec!["a"]);
        assert_eq!(out[0].merged_children[0].id, "b");
    }

    #[test]
    fn title_wins_even_when_embeddings_disagree() {
        let r = DiversityReducer::default();
        let mut a = doc("a", "Tesla Optimus Delayed Again", 0.9);
        let mut b = doc("b", "Tesla's Optimus Robot Delayed, Again", 0.5);
        a.embedding = Some(vec![1.0, 0.0]);
        b.embedding = Some(vec![0.0, 1.0]);
        assert_eq!(r.should_merge(&a, &b), Some(MergeReason::Title));
    }

    #[test]
    fn semantic_merge_for_different_headlines() {
        let r = DiversityReducer::default();
        let mut a = doc("a", "BYD overtakes Volkswagen in China", 0.9);
        let mut b = doc("b", "Chinese EV maker tops VW sales ranking", 0.7);
        let mut c = doc("c", "Solid-state battery pilot line opens", 0.6);
        a.embedding = Some(vec![1.0, 0.1, 0.0]);
        b.embedding = Some(vec![0.9, 0.2, 0.0]);
        c.embedding = Some(vec![0.0, 0.0, 1.0]);
        let out = r.reduce(vec![c, b, a]);
        assert_eq!(ids(&out), vec!["a", "c"]);
        assert_eq!(out[0].merged_children.len(), 1);
        assert_eq!(out[0].merged_children[0].id, "b");
    }

    #[test]
    fn nan_relevance_does_not_break_ordering() {
        let r = DiversityReducer::default();
        let out = r.reduce(vec![
            doc("a", "Lithium miners cut guidance", 0.4),
            doc("nan", "Senate passes charging subsidy bill", f32::NAN),
            doc("b", "Rivian opens Georgia plant", 0.9),
            doc("c", "Lithium miners cut guidance", 0.2),
        ]);
        let mut seen = all_ids(&out);
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "nan"]);
        let finite: Vec<_> = out
            .iter()
            .filter(|d| !d.relevance_score.is_nan())
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(finite, vec!["b", "a"]);
    }

    #[test]
    fn highest_score_becomes_representative() {
        let r = DiversityReducer::default();
        let out = r.reduce(vec![
            doc("low", "Ford cuts F-150 Lightning production", 0.2),
            doc("high", "Ford cuts F-150 Lightning production", 0.9),
        ]);
        assert_eq!(ids(&out), vec!["high"]);
        assert_eq!(out[0].merged_children[0].id, "low");
    }

    #[test]
    fn empty_and_single_inputs() {
        let r = DiversityReducer::default();
        assert!(r.reduce(Vec::new()).is_empty());
        let out = r.reduce(vec![doc("only", "Lone story", 0.3)]);
        assert_eq!(ids(&out), vec!["only"]);
        assert!(out[0].merged_children.is_empty());
    }

    #[test]
    fn blank_titles_stay_singletons() {
        let r = DiversityReducer::default();
        let out = r.reduce(vec![doc("a", "", 0.5), doc("b", "  ", 0.4), doc("c", "", 0.3)]);
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn comparisons_are_against_representative_only() {
        // b is close to a, c is close to b but not to a: c stays separate.
        let cfg = DiversityConfig {
            title_threshold: 2.0, // disable title merging
            ..Default::default()
        };
        let r = DiversityReducer::new(cfg);
        let mut a = doc("a", "x", 0.9);
        let mut b = doc("b", "y", 0.8);
        let mut c = doc("c", "z", 0.7);
        a.embedding = Some(vec![1.0, 0.0]);
        b.embedding = Some(vec![0.8, 0.6]);
        c.embedding = Some(vec![0.0, 1.0]);
        let out = r.reduce(vec![a, b, c]);
        assert_eq!(ids(&out), vec!["a", "c"]);
    }

    #[test]
    fn partition_and_determinism() {
        let r = DiversityReducer::default();
        let make = || {
            vec![
                doc("1", "Tesla Optimus Delayed Again", 0.9),
                doc("2", "GM recalls Bolt batteries", 0.85),
                doc("3", "Tesla's Optimus Robot Delayed, Again", 0.8),
                doc("4", "GM recalls Bolt batteries.", 0.7),
                doc("5", "Toyota bets on hydrogen", 0.7),
            ]
        };
        let first = r.reduce(make());
        let second = r.reduce(make());
        assert_eq!(all_ids(&first), all_ids(&second));
        let seen: BTreeSet<String> = all_ids(&first).into_iter().collect();
        assert_eq!(seen.len(), 5);
        assert_eq!(all_ids(&first).len(), 5);
        assert_eq!(ids(&first), vec!["1", "2", "5"]);
    }

    #[test]
    fn existing_children_are_flattened() {
        let r = DiversityReducer::default();
        let mut b = doc("b", "Same headline here", 0.5);
        b.merged_children.push(doc("b1", "Same headline here", 0.4));
        let out = r.reduce(vec![doc("a", "Same headline here", 0.9), b]);
        assert_eq!(all_ids(&out), vec!["a", "b", "b1"]);
    }

    #[test]
    fn metric_is_selectable() {
        let lev = DiversityReducer::new(DiversityConfig {
            title_metric: TitleMetric::Levenshtein,
            ..Default::default()
        });
        // Levenshtein is stricter on inserted words than the indel ratio.
        let a = "Tesla Optimus Delayed Again";
        let b = "Tesla's Optimus Robot Delayed, Again";
        assert!(lev.title_similarity(a, b) < 0.85);
        assert!(DiversityReducer::default().title_similarity(a, b) > 0.85);
    }
}
