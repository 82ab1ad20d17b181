// Copyright 2025 Irreducible Inc.
//! Canonical encodings of field elements.
//!
//! A field element is always written as the little-endian bytes of its integer representative in
//! `[0, p)`, padded to the full limb width of the field. This encoding feeds the constraint system
//! digest and therefore must never change.

use ark_ff::{BigInteger, PrimeField};
use bytes::{Buf, BufMut};
use trellis_utils::{
	SerializationError,
	serialization::{ensure_data, ensure_space},
};

/// Number of bytes one element of `F` occupies in the binary layout.
pub fn field_byte_len<F: PrimeField>() -> usize {
	<F::BigInt as BigInteger>::NUM_LIMBS * 8
}

/// Writes the canonical encoding of `value`.
pub fn serialize_field<F: PrimeField>(
	value: &F,
	mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
	let bytes = value.into_bigint().to_bytes_le();
	ensure_space(&write_buf, bytes.len())?;
	write_buf.put_slice(&bytes);
	Ok(())
}

/// Reads a canonically encoded element, rejecting representatives that are not reduced.
pub fn deserialize_field<F: PrimeField>(mut read_buf: impl Buf) -> Result<F, SerializationError> {
	let len = field_byte_len::<F>();
	ensure_data(&read_buf, len)?;
	let mut bytes = vec![0u8; len];
	read_buf.copy_to_slice(&mut bytes);

	let value = F::from_le_bytes_mod_order(&bytes);
	if value.into_bigint().to_bytes_le() != bytes {
		return Err(SerializationError::InvalidConstruction {
			name: "field element",
		});
	}
	Ok(value)
}

/// Big-endian hex of the integer representative, without a `0x` prefix.
pub fn to_hex<F: PrimeField>(value: &F) -> String {
	hex::encode(value.into_bigint().to_bytes_be())
}

/// Parses the output of [`to_hex`]. Returns `None` for malformed or unreduced input.
pub fn from_hex<F: PrimeField>(s: &str) -> Option<F> {
	let mut bytes = hex::decode(s).ok()?;
	if bytes.len() != field_byte_len::<F>() {
		return None;
	}
	bytes.reverse();
	let value = F::from_le_bytes_mod_order(&bytes);
	(value.into_bigint().to_bytes_le() == bytes).then_some(value)
}
