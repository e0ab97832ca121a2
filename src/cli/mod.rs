// CLI command implementations

pub mod index;
pub mod languages;
