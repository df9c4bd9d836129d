//! Request surface
//!
//! Provides:
//! - Validated request types, one constructor per operation
//! - The backend that executes them
//! - A line-delimited JSON server over TCP

pub mod backend;
pub mod protocol;
pub mod request;
pub mod server;

pub use backend::Backend;
pub use protocol::{RawRequest, Response};
pub use request::Request;
pub use server::CustodyServer;
