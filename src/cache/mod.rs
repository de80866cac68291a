pub mod credential_store;
pub mod token;
