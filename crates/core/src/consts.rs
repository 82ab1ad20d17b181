// Copyright 2025 Irreducible Inc.
//! Layout constants of the generic gate.

/// Number of wires of one generic half: `l`, `r` and `o`.
pub const GENERIC_WIRES: usize = 3;

/// Number of coefficients of one generic half: `sl`, `sr`, `so`, `sm` and `sc`.
pub const GENERIC_COEFFS: usize = 5;

/// Number of generic halves that share one gate row.
pub const HALVES_PER_GATE: usize = 2;

/// Wire slot of the left operand.
pub const WIRE_L: usize = 0;
/// Wire slot of the right operand.
pub const WIRE_R: usize = 1;
/// Wire slot of the output.
pub const WIRE_O: usize = 2;

/// Coefficient of the left wire.
pub const COEFF_L: usize = 0;
/// Coefficient of the right wire.
pub const COEFF_R: usize = 1;
/// Coefficient of the output wire.
pub const COEFF_O: usize = 2;
/// Coefficient of the product `l·r`.
pub const COEFF_M: usize = 3;
/// Constant term.
pub const COEFF_C: usize = 4;

/// Human readable names of the wire slots, used in diagnostics.
pub const WIRE_NAMES: [&str; GENERIC_WIRES] = ["l", "r", "o"];

/// Human readable names of the coefficients, used in diagnostics.
pub const COEFF_NAMES: [&str; GENERIC_COEFFS] = ["sl", "sr", "so", "sm", "sc"];
