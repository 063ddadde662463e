use pincell_common::{CellId, FilterId, MaterialId, TallyId};
use serde::{Deserialize, Serialize};

/// Bins a tally filter selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    Cell(Vec<CellId>),
    Material(Vec<MaterialId>),
}

impl FilterKind {
    /// Type name used in `tallies.xml`.
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterKind::Cell(_) => "cell",
            FilterKind::Material(_) => "material",
        }
    }

    pub fn bins(&self) -> Vec<u32> {
        match self {
            FilterKind::Cell(cells) => cells.iter().map(|c| c.get()).collect(),
            FilterKind::Material(mats) => mats.iter().map(|m| m.get()).collect(),
        }
    }

    pub fn from_type_bins(type_name: &str, bins: &[u32]) -> Option<Self> {
        match type_name {
            "cell" => Some(FilterKind::Cell(bins.iter().map(|b| CellId(*b)).collect())),
            "material" => Some(FilterKind::Material(
                bins.iter().map(|b| MaterialId(*b)).collect(),
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyFilter {
    pub id: FilterId,
    pub kind: FilterKind,
}

/// A named reaction-rate accumulation the engine computes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub id: TallyId,
    pub name: String,
    pub filters: Vec<TallyFilter>,
    /// Empty means the total over all nuclides.
    pub nuclides: Vec<String>,
    /// Score names such as `flux` or `(n,gamma)`.
    pub scores: Vec<String>,
}

impl Tally {
    pub fn new(id: TallyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            filters: Vec::new(),
            nuclides: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: TallyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_score(mut self, score: impl Into<String>) -> Self {
        self.scores.push(score.into());
        self
    }
}
