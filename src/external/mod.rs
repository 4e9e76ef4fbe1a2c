pub mod email;
pub mod notifier;

pub use email::*;
pub use notifier::*;
