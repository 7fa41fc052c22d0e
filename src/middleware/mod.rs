//! Request middleware for the StreamScene server

pub mod identity;

pub use identity::ResolvedIdentity;
