use serde::{Deserialize, Serialize};

/// Consensus constants. Every node of a network must agree on all of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub version: String,
    pub alt: String,
    pub count_witnesses: usize,
    pub majority_of_witnesses: usize,
    pub max_witness_list_mutations: usize,
    pub max_parents: usize,
    pub max_authors: usize,
    pub max_messages: usize,
    pub max_inputs: usize,
    pub max_outputs: usize,
    pub count_mc_balls_for_paid_witnessing: u64,
    pub total_supply: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            alt: "1".to_string(),
            count_witnesses: 12,
            majority_of_witnesses: 7,
            max_witness_list_mutations: 1,
            max_parents: 16,
            max_authors: 16,
            max_messages: 128,
            max_inputs: 128,
            max_outputs: 128,
            count_mc_balls_for_paid_witnessing: 100,
            total_supply: 1_000_000_000_000_000,
        }
    }
}

impl ProtocolConfig {
    pub fn new() -> Self { Self::default() }

    /// Fewest witnesses two lists must share for their units to be on one chain.
    pub fn min_shared_witnesses(&self) -> usize { self.count_witnesses.saturating_sub(self.max_witness_list_mutations) }

    pub fn with_witnesses(mut self, count: usize, majority: usize) -> Self {
        self.count_witnesses = count;
        self.majority_of_witnesses = majority;
        self
    }

    pub fn with_paid_witnessing_window(mut self, count: u64) -> Self {
        self.count_mc_balls_for_paid_witnessing = count;
        self
    }

    pub fn with_total_supply(mut self, total_supply: u64) -> Self {
        self.total_supply = total_supply;
        self
    }
}
