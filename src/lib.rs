pub mod bubble;
pub mod config;
pub mod engine;
pub mod store;
pub mod util;
