use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Labels in classifier output order. Index `i` of a probability vector maps to `SPECIES_LABELS[i]`.
pub const SPECIES_LABELS: [&str; 3] = ["Iris-setosa", "Iris-versicolor", "Iris-virginica"];

/// The three iris species the classifiers can predict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum Species {
    #[sea_orm(string_value = "Iris-setosa")]
    #[serde(rename = "Iris-setosa")]
    Setosa,
    #[sea_orm(string_value = "Iris-versicolor")]
    #[serde(rename = "Iris-versicolor")]
    Versicolor,
    #[sea_orm(string_value = "Iris-virginica")]
    #[serde(rename = "Iris-virginica")]
    Virginica,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Setosa, Species::Versicolor, Species::Virginica];

    /// Map a classifier output index to a species.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            Species::Setosa => 0,
            Species::Versicolor => 1,
            Species::Virginica => 2,
        }
    }

    pub fn label(self) -> &'static str {
        SPECIES_LABELS[self.index()]
    }
}

impl FromStr for Species {
    type Err = String;

    /// Accepts the canonical labels and the bare species names some datasets use
    /// (`setosa`, `versicolor`, `virginica`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let bare = normalized.strip_prefix("iris-").unwrap_or(&normalized);
        match bare {
            "setosa" => Ok(Species::Setosa),
            "versicolor" => Ok(Species::Versicolor),
            "virginica" => Ok(Species::Virginica),
            _ => Err(format!("Unknown iris species '{}'", s)),
        }
    }
}
