pub mod cfg;
pub mod error;
pub mod host;
pub mod notification;
pub mod server;
pub mod worker;
