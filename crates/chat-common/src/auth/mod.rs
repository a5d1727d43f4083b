//! Identity verification
//!
//! Tokens are issued by the external account service; the gateway only
//! verifies them and extracts the caller's [`UserId`](chat_core::UserId).

mod jwt;

pub use jwt::{Claims, JwtService, TokenType};
