pub mod auth;
pub mod catalog;
pub mod error;
pub mod sampler;
