pub mod alert;
pub mod model;
pub mod svc;

pub use svc::NotificationRelay;
