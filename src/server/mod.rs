mod account;
mod catalog;
pub mod dto;
mod households;
mod invitations;
mod list;
mod recipes;
pub mod response;
mod router;
mod stores;
pub mod validation;

pub use router::{AppState, create_router};
