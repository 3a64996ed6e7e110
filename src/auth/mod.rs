mod helpers;
mod middleware;
mod token;

pub use middleware::{AuthError, RequireUser};
pub use token::{SecretHasher, parse_token};
