#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::explicit_iter_loop,
    clippy::todo,
    clippy::unimplemented,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::print_stdout,
    missing_debug_implementations,
    unused_crate_dependencies,
    unreachable_pub,
    missing_docs
)]

mod errors;
pub use errors::Error;

mod value;
pub use value::*;

mod codec;

mod message;
pub use message::{decode_header, decode_request, decode_response, Encoder, Header};

mod framing;
pub use framing::*;

mod queue;
pub use queue::MultiQueue;

mod client;
pub use client::*;

mod sync;

// Re-export the `bytes` crate for users, to minimise version mismatches.
pub use bytes::Bytes;

// Unused crate lint workaround for dev dependencies used only by the
// benches and the integration tests.
#[cfg(test)]
use criterion as _;
#[cfg(test)]
use tempfile as _;
