pub mod environment;
pub mod runtime;
