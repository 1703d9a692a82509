//! Custom-domain subsystem: hostname directory, DNS verification state
//! machine, and the background verification poller.

pub mod directory;
pub mod poller;
pub mod verifier;

pub use directory::{DnsDiagnostics, DomainDirectory, DomainEntry};
pub use poller::VerificationPoller;
pub use verifier::{DomainVerifiedEvent, DomainVerifier, VerifyOutcome};
