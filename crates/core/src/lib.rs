// Copyright 2025 Irreducible Inc.
//! Core datatypes of the trellis generic-gate constraint system.
//!
//! Most importantly it hosts the definition of a [`ConstraintSystem`], the immutable output of
//! the compiler that a proving backend consumes.

#![warn(missing_docs)]

pub mod constraint_system;
pub mod consts;
pub mod error;
pub mod field;
pub mod verify;

pub use constraint_system::*;
pub use error::ConstraintSystemError;
