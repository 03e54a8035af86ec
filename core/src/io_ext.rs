mod reader;
mod writer;

use byteorder::{
	ByteOrder,
	ReadBytesExt,
	WriteBytesExt
};

use std::io::{
	self,
	Read,
	Write
};

use thiserror::Error;

use ultraviolet::vec::Vec3;

pub use reader::BinReader;
pub use writer::BinWriter;

/// Byte order mode of a [`BinReader`] or [`BinWriter`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endian {
	Big,
	Little,
}

impl Default for Endian {
	fn default() -> Self {
		Endian::Little
	}
}

#[derive(Error, Debug)]
pub enum StreamError {
	#[error("I/O error")]
	Io {
		#[from]
		source: io::Error,
	},
	#[error("Expected ASCII {expected:?}, found {found:X?}")]
	Ascii {
		expected: String,
		found: Vec<u8>,
	},
	#[error("Expected {len} bytes of {value:#04X} at offset {offset:#X}")]
	Pattern {
		offset: u64,
		len: usize,
		value: u8,
	},
	#[error("Placeholder reserved twice: {0}")]
	DuplicatePlaceholder(String),
	#[error("Placeholder was never reserved: {0}")]
	UnknownPlaceholder(String),
	#[error("Unresolved placeholders: {0:?}")]
	UnresolvedPlaceholders(Vec<String>),
}

impl StreamError {
	/// True if the stream ended before a read could complete
	pub fn is_eof(&self) -> bool {
		matches!(self, StreamError::Io { source } if source.kind() == io::ErrorKind::UnexpectedEof)
	}
}

pub trait ReadBinExt: Read {
	/// Reads a 3D vector in the given byte order
	#[inline]
	fn read_vec3<B>(&mut self) -> io::Result<Vec3>
	where
		B: ByteOrder,
	{
		let x = self.read_f32::<B>()?;
		let y = self.read_f32::<B>()?;
		let z = self.read_f32::<B>()?;

		Ok(Vec3::new(x, y, z))
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

pub trait WriteBinExt: Write {
	/// Writes a 3D vector in the given byte order
	#[inline]
	fn write_vec3<B>(&mut self, v: Vec3) -> io::Result<()>
	where
		B: ByteOrder,
	{
		self.write_f32::<B>(v.x)?;
		self.write_f32::<B>(v.y)?;
		self.write_f32::<B>(v.z)
	}
}

impl<W> WriteBinExt for W
where
	W: Write + ?Sized,
{
}

/// Rounds `pos` up to the next multiple of `align`
pub const fn align_up(pos: u64, align: u64) -> u64 {
	if align == 0 {
		return pos;
	}

	(pos + align - 1) / align * align
}
