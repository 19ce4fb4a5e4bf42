// Copyright (c) 2026 Truthcrawl
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Derived node reputation.
//!
//! Reputation is never stored as ground truth: it is recomputed from a set
//! of resolutions (plus optional priors), so any node folding the same
//! resolutions derives the same table.

use crate::core::dispute::{Outcome, Resolution};
use std::collections::BTreeMap;

/// Win/loss tally for one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Times the node sat in an upheld majority.
    pub wins: u64,
    /// Times the node sat in an upheld minority.
    pub losses: u64,
}

/// Folds resolutions into per-node statistics.
pub struct NodeReputation;

impl NodeReputation {
    /// Fold `resolutions` over `priors`. Only UPHELD resolutions adjust
    /// anything: majority nodes gain a win, minority nodes a loss.
    /// DISMISSED and INCONCLUSIVE resolutions contribute nothing.
    pub fn compute(
        resolutions: &[Resolution],
        priors: &BTreeMap<String, Stats>,
    ) -> BTreeMap<String, Stats> {
        let mut table = priors.clone();
        for resolution in resolutions {
            if resolution.outcome != Outcome::Upheld {
                continue;
            }
            for node in &resolution.majority_nodes {
                table.entry(node.clone()).or_default().wins += 1;
            }
            for node in &resolution.minority_nodes {
                table.entry(node.clone()).or_default().losses += 1;
            }
        }
        table
    }

    /// Canonical table text: `<node_id>:<wins>:<losses>` per line, sorted
    /// by win count descending, then node_id ascending.
    pub fn table_text(table: &BTreeMap<String, Stats>) -> String {
        let mut rows: Vec<(&String, &Stats)> = table.iter().collect();
        rows.sort_by(|a, b| b.1.wins.cmp(&a.1.wins).then_with(|| a.0.cmp(b.0)));

        let mut out = String::new();
        for (node, stats) in rows {
            out.push_str(&format!("{node}:{}:{}\n", stats.wins, stats.losses));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::now_utc;
    use crate::core::dispute::Outcome;

    fn resolution(outcome: Outcome, majority: &[&str], minority: &[&str]) -> Resolution {
        Resolution {
            dispute_id: "d-0000000000000000".to_string(),
            outcome,
            resolved_at: now_utc(),
            observations_count: 3,
            fields: Vec::new(),
            majority_nodes: majority.iter().map(|s| s.to_string()).collect(),
            minority_nodes: minority.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn only_upheld_adjusts() {
        let resolutions = vec![
            resolution(Outcome::Upheld, &["b", "c"], &["a"]),
            resolution(Outcome::Dismissed, &[], &[]),
            resolution(Outcome::Inconclusive, &["b"], &["a"]),
            resolution(Outcome::Upheld, &["b"], &["a", "c"]),
        ];
        let table = NodeReputation::compute(&resolutions, &BTreeMap::new());
        assert_eq!(table["b"], Stats { wins: 2, losses: 0 });
        assert_eq!(table["c"], Stats { wins: 1, losses: 1 });
        assert_eq!(table["a"], Stats { wins: 0, losses: 2 });
    }

    #[test]
    fn priors_seed_the_fold() {
        let mut priors = BTreeMap::new();
        priors.insert("a".to_string(), Stats { wins: 5, losses: 1 });
        let resolutions = vec![resolution(Outcome::Upheld, &["a"], &["b"])];
        let table = NodeReputation::compute(&resolutions, &priors);
        assert_eq!(table["a"], Stats { wins: 6, losses: 1 });
    }

    #[test]
    fn table_orders_by_wins_then_id() {
        let mut table = BTreeMap::new();
        table.insert("zz".to_string(), Stats { wins: 3, losses: 0 });
        table.insert("aa".to_string(), Stats { wins: 1, losses: 2 });
        table.insert("mm".to_string(), Stats { wins: 3, losses: 1 });
        let text = NodeReputation::table_text(&table);
        assert_eq!(text, "mm:3:1\nzz:3:0\naa:1:2\n");
    }
}
