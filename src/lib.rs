//! A passive, read-only decoder for the Photon binary UDP protocol spoken by
//! a target game server: command reassembly, typed parameter decoding, and a
//! registry for binding decoded operations/events to caller-declared record
//! types.
//!
//! A host constructs one [`pipeline::PhotonPipeline`], registers
//! [`registry::RecordDescriptor`]s and listeners on its
//! [`registry::TypeRegistry`], then feeds it [`protocol::command::Command`]s
//! parsed from captured datagrams — see [`capture`] for a `pcap`-backed
//! driver that does this end to end.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

pub mod capture;
pub mod pipeline;
pub mod protocol;
pub mod registry;

pub use pipeline::PhotonPipeline;
pub use registry::{RecordDescriptor, TypeRegistry};
