// src/scoring/reputation.rs
//! # Source Reputation
//!
//! Maps a document's source to a trust multiplier applied on top of the content
//! score:
//!
//! - block list → 0.1 (vetoes the item without removing it)
//! - trust list → 1.2
//! - anything else → 0.9
//!
//! The source key is the URL host (without `www.`). When the host belongs to an
//! aggregator (every item shares it, so it cannot discriminate) the key is the
//! publisher suffix after the last `" - "` in the title instead. Matching is
//! case-insensitive substring containment on whitespace-stripped strings, block
//! list first.

use serde::Deserialize;

use super::{Component, ScoreError, ScoreInput, ScoreProvider};
use crate::document::{Document, NEUTRAL_REPUTATION};

pub const BLOCKED_MULTIPLIER: f32 = 0.1;
pub const TRUSTED_MULTIPLIER: f32 = 1.2;

/// Press-release wires and SEO farms.
pub const SEED_BLOCK_LIST: [&str; 9] = [
    "prnewswire",
    "globenewswire",
    "businesswire",
    "accesswire",
    "einpresswire",
    "simplywall.st",
    "filmogaz",
    "speedme",
    "fool.com",
];

/// Wire services and trade outlets.
pub const SEED_TRUST_LIST: [&str; 8] = [
    "reuters",
    "bloomberg",
    "wsj",
    "nikkei",
    "electrek",
    "insideevs",
    "autonews",
    "techcrunch",
];

/// Reputation lists as they appear in config. Each list omitted from the
/// section keeps its seed; an explicit `[]` empties it.
#[derive(Debug, Clone, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "default_block_list")]
    pub block_list: Vec<String>,
    #[serde(default = "default_trust_list")]
    pub trust_list: Vec<String>,
    /// Host markers identifying aggregators (substring of the host).
    #[serde(default = "default_aggregator_hosts")]
    pub aggregator_hosts: Vec<String>,
}

fn default_block_list() -> Vec<String> {
    SEED_BLOCK_LIST.iter().map(|s| s.to_string()).collect()
}

fn default_trust_list() -> Vec<String> {
    SEED_TRUST_LIST.iter().map(|s| s.to_string()).collect()
}

fn default_aggregator_hosts() -> Vec<String> {
    vec!["google".to_string()]
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            block_list: default_block_list(),
            trust_list: default_trust_list(),
            aggregator_hosts: default_aggregator_hosts(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReputationPolicy {
    block_list: Vec<String>,
    trust_list: Vec<String>,
    aggregator_hosts: Vec<String>,
}

impl ReputationPolicy {
    pub fn new<I, J, K, S>(block_list: I, trust_list: J, aggregator_hosts: K) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            block_list: clean_list(block_list),
            trust_list: clean_list(trust_list),
            aggregator_hosts: clean_list(aggregator_hosts),
        }
    }

    pub fn from_config(cfg: &ReputationConfig) -> Self {
        Self::new(&cfg.block_list, &cfg.trust_list, &cfg.aggregator_hosts)
    }

    /// Built-in lists: [`SEED_BLOCK_LIST`], [`SEED_TRUST_LIST`], google as the
    /// only aggregator.
    pub fn default_seed() -> Self {
        Self::new(SEED_BLOCK_LIST, SEED_TRUST_LIST, ["google"])
    }

    pub fn is_aggregator(&self, host: &str) -> bool {
        let h = normalize(host);
        !h.is_empty() && self.aggregator_hosts.iter().any(|m| h.contains(m))
    }

    /// The string the lists are matched against.
    pub fn source_key(&self, doc: &Document) -> String {
        let host = host_of(&doc.url);
        let key = if host.is_empty() {
            String::new()
        } else if self.is_aggregator(&host) {
            title_suffix(&doc.title).unwrap_or_default()
        } else {
            host
        };
        if key.is_empty() {
            normalize(&doc.source)
        } else {
            normalize(&key)
        }
    }

    pub fn multiplier_for_key(&self, key: &str) -> f32 {
        let k = normalize(key);
        if k.is_empty() {
            return NEUTRAL_REPUTATION;
        }
        if self.block_list.iter().any(|b| k.contains(b)) {
            BLOCKED_MULTIPLIER
        } else if self.trust_list.iter().any(|t| k.contains(t)) {
            TRUSTED_MULTIPLIER
        } else {
            NEUTRAL_REPUTATION
        }
    }

    pub fn multiplier(&self, doc: &Document) -> f32 {
        self.multiplier_for_key(&self.source_key(doc))
    }
}

impl ScoreProvider for ReputationPolicy {
    fn component(&self) -> Component {
        Component::Reputation
    }

    fn score(&self, input: &ScoreInput<'_>) -> Result<f32, ScoreError> {
        Ok(self.multiplier(input.doc))
    }
}

/// Lowercase and strip all whitespace.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn clean_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = items
        .into_iter()
        .map(|s| normalize(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Host of `url`, lowercased, without scheme, credentials, port or `www.`.
pub fn host_of(url: &str) -> String {
    let rest = url.trim();
    let rest = rest.split_once("://").map(|(_, r)| r).unwrap_or(rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    let host = authority.split(':').next().unwrap_or_default().to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Publisher suffix after the last `" - "` in an aggregator title.
pub fn title_suffix(title: &str) -> Option<String> {
    let (_, suffix) = title.rsplit_once(" - ")?;
    let s = suffix.trim();
    (!s.is_empty()).then(|| s.to_string())
}
