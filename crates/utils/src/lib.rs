// Copyright 2025 Irreducible Inc.

//! Utilities shared by the trellis crates.

pub mod serialization;

pub use bytes;
pub use serialization::{DeserializeBytes, SerializationError, SerializeBytes};
