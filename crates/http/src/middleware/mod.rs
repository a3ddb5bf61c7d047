//! Request authentication

pub mod auth;

pub use auth::{API_KEY_HEADER, AuthResolver, USER_ID_HEADER, extract_api_key, extract_token};
