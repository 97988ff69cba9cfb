mod docker;
mod workspace;

pub use docker::DockerBackend;
pub use workspace::{materialize_bundle, BUILD_DESCRIPTOR_FILE};
