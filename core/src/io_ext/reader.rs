use byteorder::{
	BE,
	ByteOrder,
	LE,
	ReadBytesExt
};

use std::io::{
	self,
	Read,
	Seek,
	SeekFrom
};

use ultraviolet::vec::Vec3;

use super::{
	Endian,
	ReadBinExt,
	StreamError
};

macro_rules! read_endian {
	($($name: ident => $ty: ty),* $(,)?) => {
		$(
			#[inline]
			pub fn $name(&mut self) -> Result<$ty, StreamError> {
				Ok(match self.endian {
					Endian::Big => self.inner.$name::<BE>()?,
					Endian::Little => self.inner.$name::<LE>()?,
				})
			}
		)*
	}
}

/// Seekable binary reader with a switchable byte order
#[derive(Debug)]
pub struct BinReader<R> {
	inner: R,
	endian: Endian,
}

impl<R> BinReader<R>
where
	R: Read + Seek,
{
	pub fn new(inner: R) -> BinReader<R> {
		BinReader {
			inner: inner,
			endian: Endian::default(),
		}
	}

	pub fn endian(&self) -> Endian {
		self.endian
	}

	pub fn set_endian(&mut self, endian: Endian) {
		self.endian = endian;
	}

	/// Runs `f` with the byte order switched to `endian`.
	/// The previous byte order is restored whether `f` succeeds or not.
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

	pub fn position(&mut self) -> Result<u64, StreamError> {
		Ok(self.inner.stream_position()?)
	}

	pub fn seek(&mut self, pos: u64) -> Result<(), StreamError> {
		self.inner.seek(SeekFrom::Start(pos))?;
		Ok(())
	}

	/// Runs `f` at the absolute position `pos`, then returns the cursor to where it was.
	/// Calls may be nested.
	pub fn step_in<T, E, F>(&mut self, pos: u64, f: F) -> Result<T, E>
	where
		E: From<StreamError>,
		F: FnOnce(&mut Self) -> Result<T, E>,
	{
		let saved = self.position()?;
		self.seek(pos)?;

		let res = f(self);
		let restored = self.seek(saved);

		match (res, restored) {
			(Err(e), _) => Err(e),
			(Ok(_), Err(e)) => Err(e.into()),
			(Ok(v), Ok(())) => Ok(v),
		}
	}

	#[inline]
	pub fn read_u8(&mut self) -> Result<u8, StreamError> {
		Ok(self.inner.read_u8()?)
	}

	#[inline]
	pub fn read_i8(&mut self) -> Result<i8, StreamError> {
		Ok(self.inner.read_i8()?)
	}

	read_endian! {
		read_u16 => u16,
		read_i16 => i16,
		read_u32 => u32,
		read_i32 => i32,
		read_f32 => f32,
	}

	#[inline]
	pub fn read_vec3(&mut self) -> Result<Vec3, StreamError> {
		Ok(match self.endian {
			Endian::Big => self.inner.read_vec3::<BE>()?,
			Endian::Little => self.inner.read_vec3::<LE>()?,
		})
	}

	/// Reads exactly `len` bytes. The buffer grows with the data actually read, so a bogus length
	/// fails with an end of stream error instead of a huge allocation.
	pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, StreamError> {
		let mut data = Vec::new();
		(&mut self.inner).take(len as u64).read_to_end(&mut data)?;
		if data.len() < len {
			return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
		}

		Ok(data)
	}

	fn read_array_bytes(&mut self, count: usize, width: usize) -> Result<Vec<u8>, StreamError> {
		let len = count.checked_mul(width)
			.ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
		self.read_bytes(len)
	}

	/// Reads `count` 16-bit values in the current byte order
	pub fn read_u16s(&mut self, count: usize) -> Result<Vec<u16>, StreamError> {
		let raw = self.read_array_bytes(count, 2)?;
		let mut data = vec![0; count];
		match self.endian {
			Endian::Big => BE::read_u16_into(&raw, &mut data),
			Endian::Little => LE::read_u16_into(&raw, &mut data),
		}

		Ok(data)
	}

	pub fn read_i16s(&mut self, count: usize) -> Result<Vec<i16>, StreamError> {
		let raw = self.read_array_bytes(count, 2)?;
		let mut data = vec![0; count];
		match self.endian {
			Endian::Big => BE::read_i16_into(&raw, &mut data),
			Endian::Little => LE::read_i16_into(&raw, &mut data),
		}

		Ok(data)
	}

	/// Reads `expected.len()` bytes and fails unless they spell `expected`
	pub fn assert_ascii(&mut self, expected: &str) -> Result<(), StreamError> {
		let found = self.read_bytes(expected.len())?;
		if found != expected.as_bytes() {
			return Err(StreamError::Ascii {
				expected: expected.to_string(),
				found: found,
			});
		}

		Ok(())
	}

	/// Reads `len` bytes and fails unless every one of them equals `value`
	pub fn assert_pattern(&mut self, len: usize, value: u8) -> Result<(), StreamError> {
		let offset = self.position()?;
		let data = self.read_bytes(len)?;
		if data.iter().any(|b| *b != value) {
			return Err(StreamError::Pattern {
				offset: offset,
				len: len,
				value: value,
			});
		}

		Ok(())
	}

	pub fn into_inner(self) -> R {
		self.inner
	}
}
