//! Vertex buffer layouts.
//!
//! Vertex records are kept as opaque bytes. The container only needs to know how long a record is
//! for a given model version and vertex format, so supporting another layout means adding a
//! [`VertexLayout`] variant and its entry in [`VertexLayout::resolve`].

#[cfg(feature = "import")]
use std::io::{
	Read,
	Seek
};

#[cfg(feature = "import")]
use akit_core::io_ext::BinReader;

#[cfg(feature = "export")]
use akit_core::io_ext::BinWriter;

use crate::error::Smd4Error;

pub const VERSION_40001: i32 = 0x40001;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VertexLayout {
	/// Version 0x40001, format 0
	Compact,
	/// Version 0x40001, format 2
	Extended,
}

impl VertexLayout {
	pub fn resolve(version: i32, format: u8) -> Result<VertexLayout, Smd4Error> {
		match (version, format) {
			(VERSION_40001, 0) => Ok(VertexLayout::Compact),
			(VERSION_40001, 2) => Ok(VertexLayout::Extended),
			_ => Err(Smd4Error::UnsupportedLayout {
				version: version,
				format: format,
			}),
		}
	}

	/// Size of a single vertex record in bytes
	pub const fn size(self) -> u32 {
		match self {
			VertexLayout::Compact => 16,
			VertexLayout::Extended => 36,
		}
	}

	/// Number of whole records in a buffer of `len` bytes
	pub fn count(self, len: usize) -> Result<u32, Smd4Error> {
		let size = self.size();
		if len % size as usize != 0 {
			return Err(Smd4Error::VertexBufferLength {
				len: len,
				size: size,
			});
		}

		Ok((len / size as usize) as u32)
	}

	#[cfg(feature = "import")]
	pub fn read_buffer<R>(self, count: usize, br: &mut BinReader<R>) -> Result<Vec<u8>, Smd4Error>
	where
		R: Read + Seek,
	{
		Ok(br.read_bytes(count * self.size() as usize)?)
	}

	#[cfg(feature = "export")]
	pub fn write_buffer(self, data: &[u8], bw: &mut BinWriter) -> Result<(), Smd4Error> {
		self.count(data.len())?;
		Ok(bw.write_bytes(data)?)
	}
}

/// Looks up the vertex record size for a model version and vertex format
pub fn vertex_size(version: i32, format: u8) -> Result<u32, Smd4Error> {
	Ok(VertexLayout::resolve(version, format)?.size())
}
