pub mod session;
pub mod token;

pub use session::SessionState;
pub use token::{token_preview, TokenPair};
