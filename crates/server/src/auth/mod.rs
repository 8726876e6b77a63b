//! Bearer tokens for Git and LFS clients.
//!
//! Tokens are HS256 JWTs signed with a shared secret. The server only
//! validates them; `forge token issue` mints them.

pub mod jwt;

pub use jwt::{Claims, JwtTokenValidator, TokenIssuer};
