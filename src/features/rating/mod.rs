pub mod engine;

pub use engine::chart_constant;
