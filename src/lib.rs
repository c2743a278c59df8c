pub mod biome;
pub mod climate;
pub mod config;
pub mod error;
pub mod features;
pub mod generator;
pub mod grid;
pub mod heightmap;
pub mod hydrology;
pub mod random;
pub mod snapshot;

pub use biome::Biome;
pub use config::MapOptions;
pub use error::{MapError, Result};
pub use generator::{MapSession, generate};
pub use heightmap::Template;
pub use snapshot::{GenerationWarning, MapSnapshot};
