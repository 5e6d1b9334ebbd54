//! Session auth: argon2id password hashing and JWT session cookies.

mod claims;
mod jwt;
mod password;
mod session;

pub use claims::{Claims, SessionUser};
pub use jwt::SessionManager;
pub use password::{hash_password, verify_password};
pub use session::{AdminUser, SESSION_COOKIE, clear_session_cookie, session_cookie};
