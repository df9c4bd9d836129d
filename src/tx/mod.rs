//! Stellar transaction construction
//!
//! Payment transactions built on `stellar_xdr`, their network hash and
//! signed envelopes.

pub mod transaction;

pub use transaction::{
    build_transaction, parse_asset, payment_op, sign_transaction, text_memo, to_stroops,
    SignedEnvelope,
};
