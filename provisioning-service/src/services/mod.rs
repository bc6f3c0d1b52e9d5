pub mod account;
pub mod appwrite;
pub mod backend;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod profile;
pub mod provisioning;
pub mod session;

pub use account::AccountService;
pub use appwrite::AppwriteClient;
pub use backend::{Backend, IdentityService, ProfileStore, TeamClient};
pub use error::{BackendError, ServiceError};
pub use memory::InMemoryBackend;
pub use profile::ProfileService;
pub use provisioning::ProvisioningService;
pub use session::SessionResolver;
