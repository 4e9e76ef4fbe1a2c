pub mod admission;
pub mod event;
pub mod registration;

pub use admission::admission_config;
pub use event::event_config;
pub use registration::registration_config;
