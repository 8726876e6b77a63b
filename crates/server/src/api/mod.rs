pub mod ops;
pub mod server;
