use std::collections::BTreeMap;
use worldcell_common::WeightingContext;

/// Source of standing values between the perceiver's side and others.
pub trait ReputationSource {
    fn relationships(&self) -> Vec<(String, f32)>;
}

/// Build a fresh weighting context from `source`.
///
/// Later duplicates of the same relationship id win.
pub fn weighting_context(source: &dyn ReputationSource) -> WeightingContext {
    source.relationships().into_iter().collect()
}

/// In-memory standing table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandingTable {
    standings: BTreeMap<String, f32>,
}

impl StandingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: impl Into<String>, standing: f32) -> Option<f32> {
        self.standings.insert(id.into(), standing)
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.standings.get(id).copied()
    }

    pub fn remove(&mut self, id: &str) -> Option<f32> {
        self.standings.remove(id)
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }
}

impl ReputationSource for StandingTable {
    fn relationships(&self) -> Vec<(String, f32)> {
        self.standings
            .iter()
            .map(|(id, standing)| (id.clone(), *standing))
            .collect()
    }
}

impl FromIterator<(String, f32)> for StandingTable {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        Self {
            standings: iter.into_iter().collect(),
        }
    }
}
