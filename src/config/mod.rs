mod server;

pub use server::{MailConfig, MediaConfig, ServerConfig};
