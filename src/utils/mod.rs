pub mod credential;
pub mod jwt;

pub use credential::*;
pub use jwt::*;
