mod logger;
pub use logger::*;

mod view;
pub use view::{log_transition, message_for};
