pub mod entities;
pub mod species;

pub use species::{Species, SPECIES_LABELS};
