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
pub use value::{Table, Value};

mod serial;

mod packet;
pub use packet::Packet;

mod session;
pub use session::{Event, Session};

pub mod transport;
pub use transport::{TcpTransport, Transport};

mod client;
pub use client::Client;

// Unused crate lint workaround: criterion is only exercised by benches/, not
// by anything under src/.
#[cfg(test)]
use criterion as _;
