pub mod error;
pub mod weakbus;
