mod error;
mod manager;
mod sweeper;

pub use error::ArtifactError;
pub use manager::{ArtifactFormat, TempArtifactManager};
pub use sweeper::{spawn_periodic_sweeper, sweep_once, SweeperHandle};
