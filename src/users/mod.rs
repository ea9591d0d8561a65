pub mod fallback;
pub mod memory;
pub mod pg;
pub mod repo;
pub mod repo_types;

pub use repo::{StoreError, UserStore};
pub use repo_types::{normalize_email, NewUser, Role, User, UserStatus};
