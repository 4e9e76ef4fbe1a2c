pub mod discount_code;
pub mod event;
pub mod member;
pub mod pagination;
pub mod pricing_rule;
pub mod registration;
pub mod ticket_type;

pub use discount_code::*;
pub use event::*;
pub use member::*;
pub use pagination::*;
pub use pricing_rule::*;
pub use registration::*;
pub use ticket_type::*;
