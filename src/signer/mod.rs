//! Payment signing
//!
//! Signer resolution and transaction assembly, integrating account storage,
//! policy enforcement and the ledger client.

pub mod assembler;
pub mod resolver;

pub use assembler::{PaymentAssembler, PaymentRequest, SignedTransaction};
pub use resolver::{ResolvedSigners, SignerResolver};
