//! Login and token federation across networks

pub mod federation;
pub mod login;

pub use federation::{FederatedToken, FederationMap, strip_bearer};
pub use login::LoginService;
