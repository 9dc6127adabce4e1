pub mod analytics;
pub mod announcements;
pub mod articles;
pub mod auth;
pub mod convert;
pub mod error;
pub mod feedback;
pub mod mail;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, AppStateInner, AuthSettings};
