//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod hospital_directory;
pub mod route_client;
pub mod store;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use deps::DispatchDeps;
pub use hospital_directory::InMemoryHospitalDirectory;
pub use route_client::OpenRouteServiceClient;
pub use store::{InMemoryDispatchStore, PostgresDispatchStore};
pub use stream_hub::StreamHub;
pub use test_dependencies::TestDependencies;
pub use traits::*;
