//! The Photon binary protocol decoding pipeline.
//!
//! Modules are layered leaf-first, matching how a datagram is actually
//! decoded: [`cursor`] reads primitives, [`value`] decodes the tagged type
//! system on top of it, [`command`] splits a datagram into commands,
//! [`fragment`] reassembles fragmented reliable commands, [`message`] parses
//! a reliable command's header, and [`params`] decodes its parameter
//! dictionary. [`character_id`] is a small leaf used by the registry (see
//! [`crate::registry`]) rather than by the decode path itself.

pub mod character_id;
pub mod command;
pub mod cursor;
pub mod error;
pub mod fragment;
pub mod message;
pub mod params;
pub mod value;

pub use error::DecodeError;
