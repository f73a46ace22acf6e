pub mod models;

pub use models::{
    Difficulty, PlayerProfile, Rank, RawScore, ScoreEntry, ScoreSheet, Section, SectionKind,
};
