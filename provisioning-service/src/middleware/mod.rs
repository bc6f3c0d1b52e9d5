pub mod session;

pub use session::{admin_middleware, session_middleware, CurrentUser};
