mod helpers;
mod middleware;
mod token;

pub use helpers::Principal;
pub use middleware::{AuthError, OptionalUser, RequireUser, RequireVerified};
pub use token::{TokenGenerator, generate_code, generate_reset_token, parse_token};
