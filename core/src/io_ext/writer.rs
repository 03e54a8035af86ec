use byteorder::{
	BE,
	ByteOrder,
	LE,
	WriteBytesExt
};

use std::collections::BTreeMap;

use ultraviolet::vec::Vec3;

use super::{
	align_up,
	Endian,
	StreamError,
	WriteBinExt
};

/// Value written in place of a reserved field until it is filled
pub const PLACEHOLDER_FILL: u8 = 0xFE;

macro_rules! write_endian {
	($($name: ident => $ty: ty),* $(,)?) => {
		$(
			#[inline]
			pub fn $name(&mut self, value: $ty) -> Result<(), StreamError> {
				match self.endian {
					Endian::Big => self.buf.$name::<BE>(value)?,
					Endian::Little => self.buf.$name::<LE>(value)?,
				}

				Ok(())
			}
		)*
	}
}

#[derive(Clone, Copy, Debug)]
struct Reservation {
	position: usize,
	endian: Endian,
}

/// Forward-only binary writer with named placeholders that are filled once their value is known
#[derive(Debug, Default)]
pub struct BinWriter {
	buf: Vec<u8>,
	endian: Endian,
	reservations: BTreeMap<String, Reservation>,
	reserved_total: usize,
}

impl BinWriter {
	pub fn new(endian: Endian) -> BinWriter {
		BinWriter {
			endian: endian,
			..BinWriter::default()
		}
	}

	pub fn endian(&self) -> Endian {
		self.endian
	}

	pub fn set_endian(&mut self, endian: Endian) {
		self.endian = endian;
	}

	/// Runs `f` with the byte order switched to `endian`, restoring it afterwards
	pub fn with_endian<T, E, F>(&mut self, endian: Endian, f: F) -> Result<T, E>
	where
		F: FnOnce(&mut Self) -> Result<T, E>,
	{
		let prev = self.endian;
		self.endian = endian;
		let res = f(self);
		self.endian = prev;

		res
	}

	pub fn position(&self) -> usize {
		self.buf.len()
	}

	#[inline]
	pub fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
		self.buf.push(value);
		Ok(())
	}

	#[inline]
	pub fn write_i8(&mut self, value: i8) -> Result<(), StreamError> {
		self.buf.push(value as u8);
		Ok(())
	}

	write_endian! {
		write_u16 => u16,
		write_i16 => i16,
		write_u32 => u32,
		write_i32 => i32,
		write_f32 => f32,
	}

	#[inline]
	pub fn write_vec3(&mut self, v: Vec3) -> Result<(), StreamError> {
		match self.endian {
			Endian::Big => self.buf.write_vec3::<BE>(v)?,
			Endian::Little => self.buf.write_vec3::<LE>(v)?,
		}

		Ok(())
	}

	pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), StreamError> {
		self.buf.extend_from_slice(data);
		Ok(())
	}

	pub fn write_u16s(&mut self, values: &[u16]) -> Result<(), StreamError> {
		for v in values.iter() {
			self.write_u16(*v)?;
		}

		Ok(())
	}

	pub fn write_i16s(&mut self, values: &[i16]) -> Result<(), StreamError> {
		for v in values.iter() {
			self.write_i16(*v)?;
		}

		Ok(())
	}

	pub fn write_ascii(&mut self, text: &str) -> Result<(), StreamError> {
		self.write_bytes(text.as_bytes())
	}

	/// Writes `len` copies of `value`
	pub fn write_pattern(&mut self, len: usize, value: u8) -> Result<(), StreamError> {
		self.buf.resize(self.buf.len() + len, value);
		Ok(())
	}

	/// Writes zeroes up to the next multiple of `align`
	pub fn pad(&mut self, align: usize) -> Result<(), StreamError> {
		let target = align_up(self.buf.len() as u64, align as u64) as usize;
		self.buf.resize(target, 0);
		Ok(())
	}

	/// Writes a 4-byte placeholder to be filled later by [`fill_i32`](Self::fill_i32)
	pub fn reserve_i32<K>(&mut self, key: K) -> Result<(), StreamError>
	where
		K: Into<String>,
	{
		let key = key.into();
		if self.reservations.contains_key(&key) {
			return Err(StreamError::DuplicatePlaceholder(key));
		}

		self.reservations.insert(key, Reservation {
			position: self.buf.len(),
			endian: self.endian,
		});
		self.reserved_total += 1;

		self.write_pattern(4, PLACEHOLDER_FILL)
	}

	/// Patches a previously reserved placeholder, in the byte order active when it was reserved
	pub fn fill_i32(&mut self, key: &str, value: i32) -> Result<(), StreamError> {
		let res = self.reservations.remove(key)
			.ok_or_else(|| StreamError::UnknownPlaceholder(key.to_string()))?;

		let slot = &mut self.buf[res.position..res.position + 4];
		match res.endian {
			Endian::Big => BE::write_i32(slot, value),
			Endian::Little => LE::write_i32(slot, value),
		}

		Ok(())
	}

	/// Keys of placeholders that have been reserved but not filled yet
	pub fn pending(&self) -> Vec<String> {
		self.reservations.keys().cloned().collect()
	}

	/// Number of placeholders reserved over the writer's lifetime
	pub fn reserved_total(&self) -> usize {
		self.reserved_total
	}

	/// Returns the finished buffer. Fails if any placeholder is still unresolved.
	pub fn finish(self) -> Result<Vec<u8>, StreamError> {
		if !self.reservations.is_empty() {
			return Err(StreamError::UnresolvedPlaceholders(self.pending()));
		}

		Ok(self.buf)
	}
}
