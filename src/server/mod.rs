mod audios;
pub mod dto;
mod favorites;
mod history;
mod media;
mod playlists;
mod profiles;
pub mod response;
mod router;
mod upload;
mod users;
pub mod validation;

pub use router::{AppState, create_router};
