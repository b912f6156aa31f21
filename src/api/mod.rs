pub mod demo;
pub mod peers;
pub mod server;
pub mod users;
