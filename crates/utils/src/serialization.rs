// Copyright 2025 Irreducible Inc.

//! Little-endian binary encoding used for constraint system digests and storage.
//!
//! The layout is deliberately simple: fixed-width integers, `usize` narrowed to `u32`, sequences
//! prefixed with their length and optional values prefixed with a one byte tag.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Serialize a value into a byte buffer.
pub trait SerializeBytes {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError>;
}

/// Deserialize a value from a byte buffer.
pub trait DeserializeBytes {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
	#[error("Write buffer is full")]
	WriteBufferFull,
	#[error("Not enough data in read buffer to deserialize")]
	NotEnoughBytes,
	#[error("Unknown tag {tag} for {name}")]
	UnknownTag { name: &'static str, tag: u8 },
	#[error("Invalid construction of {name}")]
	InvalidConstruction { name: &'static str },
	#[error("usize {size} is too large to serialize (max is {max})", max = u32::MAX)]
	UsizeTooLarge { size: usize },
}

impl<T: SerializeBytes + ?Sized> SerializeBytes for &T {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		(**self).serialize(write_buf)
	}
}

macro_rules! impl_int {
	($ty:ty, $put:ident, $get:ident) => {
		impl SerializeBytes for $ty {
			fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
				ensure_space(&write_buf, size_of::<$ty>())?;
				write_buf.$put(*self);
				Ok(())
			}
		}

		impl DeserializeBytes for $ty {
			fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
				ensure_data(&read_buf, size_of::<$ty>())?;
				Ok(read_buf.$get())
			}
		}
	};
}

impl_int!(u8, put_u8, get_u8);
impl_int!(u32, put_u32_le, get_u32_le);
impl_int!(u64, put_u64_le, get_u64_le);

impl SerializeBytes for usize {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		let value = u32::try_from(*self)
			.map_err(|_| SerializationError::UsizeTooLarge { size: *self })?;
		value.serialize(write_buf)
	}
}

impl DeserializeBytes for usize {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(u32::deserialize(read_buf)? as usize)
	}
}

impl SerializeBytes for bool {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		u8::from(*self).serialize(write_buf)
	}
}

impl DeserializeBytes for bool {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		match u8::deserialize(read_buf)? {
			0 => Ok(false),
			1 => Ok(true),
			tag => Err(SerializationError::UnknownTag { name: "bool", tag }),
		}
	}
}

impl<T: SerializeBytes> SerializeBytes for [T] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.len().serialize(&mut write_buf)?;
		self.iter()
			.try_for_each(|item| item.serialize(&mut write_buf))
	}
}

impl<T: SerializeBytes> SerializeBytes for Vec<T> {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.as_slice().serialize(write_buf)
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Vec<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let len = usize::deserialize(&mut read_buf)?;
		// Every item occupies at least one byte, so a length larger than the remaining data is
		// corrupt and must not drive the allocation.
		ensure_data(&read_buf, len)?;
		(0..len).map(|_| T::deserialize(&mut read_buf)).collect()
	}
}

impl<T: SerializeBytes> SerializeBytes for Option<T> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		match self {
			Some(value) => {
				1u8.serialize(&mut write_buf)?;
				value.serialize(write_buf)
			}
			None => 0u8.serialize(write_buf),
		}
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Option<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		match u8::deserialize(&mut read_buf)? {
			0 => Ok(None),
			1 => Ok(Some(T::deserialize(read_buf)?)),
			tag => Err(SerializationError::UnknownTag {
				name: "Option",
				tag,
			}),
		}
	}
}

impl<T: SerializeBytes, const N: usize> SerializeBytes for [T; N] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.iter()
			.try_for_each(|item| item.serialize(&mut write_buf))
	}
}

impl<T: DeserializeBytes, const N: usize> DeserializeBytes for [T; N] {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let items = (0..N)
			.map(|_| T::deserialize(&mut read_buf))
			.collect::<Result<Vec<_>, _>>()?;
		items
			.try_into()
			.map_err(|_| SerializationError::InvalidConstruction { name: "array" })
	}
}

/// Fails with [`SerializationError::WriteBufferFull`] unless `size` more bytes fit.
pub fn ensure_space(write_buf: &impl BufMut, size: usize) -> Result<(), SerializationError> {
	if write_buf.remaining_mut() < size {
		return Err(SerializationError::WriteBufferFull);
	}
	Ok(())
}

/// Fails with [`SerializationError::NotEnoughBytes`] unless `size` more bytes can be read.
pub fn ensure_data(read_buf: &impl Buf, size: usize) -> Result<(), SerializationError> {
	if read_buf.remaining() < size {
		return Err(SerializationError::NotEnoughBytes);
	}
	Ok(())
}
