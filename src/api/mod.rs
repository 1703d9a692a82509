//! HTTP boundary layer.
//!
//! Thin mapping between transport and the core contracts; the resolver
//! and verifier know nothing about HTTP.

pub mod domains;
pub mod redirect;

pub use domains::domain_routes;
pub use redirect::redirect_routes;
