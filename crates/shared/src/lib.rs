pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod realtime;

pub use auth::*;
pub use channel::*;
pub use error::*;
pub use events::*;
pub use ids::*;
