#[cfg(feature = "import")]
use std::io::{
	Read,
	Seek
};

use std::slice::Windows;

#[cfg(feature = "import")]
use log::trace;

#[cfg(feature = "import")]
use akit_core::io_ext::BinReader;

#[cfg(feature = "export")]
use akit_core::io_ext::BinWriter;

use crate::{
	error::Smd4Error,
	vertex::VertexLayout
};

#[cfg(feature = "export")]
use crate::error::field_i32;

/// Size of a mesh descriptor in bytes
pub const MESH_SIZE: usize = 0x50;
/// Number of slots in every mesh's bone palette
pub const BONE_PALETTE_SIZE: usize = 28;
/// Palette slot marker for "no bone"
pub const NO_BONE: i16 = -1;
/// Strip index that breaks the strip without ending the buffer
pub const PRIMITIVE_RESTART: u16 = 0xFFFF;
/// Alignment of each vertex buffer inside the data region
pub const VERTEX_BUFFER_ALIGN: usize = 0x10;

/// A single chunk of geometry: a triangle strip over an opaque vertex buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
	pub vertex_format: u8,
	pub unk01: u8,
	pub unk02: u8,
	pub unk03: bool,
	pub unk04: bool,
	pub unk06: i16,
	/// Indices into the model's bones, [`NO_BONE`] for unused slots
	pub bone_indices: [i16; BONE_PALETTE_SIZE],
	/// Triangle strip, with [`PRIMITIVE_RESTART`] separating sub-strips
	pub indices: Vec<u16>,
	/// Raw vertex records, see [`VertexLayout`]
	pub vertices: Vec<u8>,
}

impl Mesh {
	pub fn new(vertex_format: u8) -> Mesh {
		Mesh {
			vertex_format: vertex_format,
			unk01: 0,
			unk02: 0,
			unk03: false,
			unk04: false,
			unk06: 0,
			bone_indices: [NO_BONE; BONE_PALETTE_SIZE],
			indices: vec![],
			vertices: vec![],
		}
	}

	/// Number of palette slots in use
	pub fn bone_count(&self) -> u32 {
		self.bone_indices.iter().filter(|i| **i != NO_BONE).count() as u32
	}

	/// Number of vertex records, given the model version
	pub fn vertex_count(&self, version: i32) -> Result<u32, Smd4Error> {
		VertexLayout::resolve(version, self.vertex_format)?.count(self.vertices.len())
	}

	/// Iterates over the triangles of the strip.
	///
	/// Every window of three consecutive indices is a candidate triangle, and every other window
	/// has its winding reversed. With `allow_primitive_restarts`, windows touching a
	/// [`PRIMITIVE_RESTART`] are skipped. Without `include_degenerate_faces`, windows that repeat
	/// an index are skipped. Skipped windows still count towards the winding alternation.
	pub fn faces(&self, allow_primitive_restarts: bool, include_degenerate_faces: bool) -> StripFaces<'_> {
		StripFaces {
			windows: self.indices.windows(3),
			flip: false,
			allow_primitive_restarts: allow_primitive_restarts,
			include_degenerate_faces: include_degenerate_faces,
		}
	}

	/// Flattened triangle list of the strip
	pub fn triangulate(&self, allow_primitive_restarts: bool, include_degenerate_faces: bool) -> Vec<u16> {
		self.faces(allow_primitive_restarts, include_degenerate_faces)
			.flat_map(|face| face)
			.collect()
	}

	pub fn face_count(&self, allow_primitive_restarts: bool, include_degenerate_faces: bool) -> u32 {
		self.faces(allow_primitive_restarts, include_degenerate_faces).count() as u32
	}

	pub fn face_indices(&self, allow_primitive_restarts: bool, include_degenerate_faces: bool)
		-> Vec<(u16, u16, u16)>
	{
		self.triangulate(allow_primitive_restarts, include_degenerate_faces)
			.chunks_exact(3)
			.map(|t| (t[0], t[1], t[2]))
			.collect()
	}

	/// Reads a mesh descriptor along with the index and vertex buffers it points to.
	/// `data_offset` is the absolute start of the data region.
	#[cfg(feature = "import")]
	pub(crate) fn read<R>(version: i32, data_offset: u64, br: &mut BinReader<R>) -> Result<Mesh, Smd4Error>
	where
		R: Read + Seek,
	{
		let vertex_format = br.read_u8()?;
		let unk01 = br.read_u8()?;
		let unk02 = br.read_u8()?;
		let unk03 = read_flag(br)?;
		let unk04 = read_flag(br)?;
		br.assert_pattern(1, 0)?;
		let unk06 = br.read_i16()?;

		let mut bone_indices = [NO_BONE; BONE_PALETTE_SIZE];
		bone_indices.copy_from_slice(&br.read_i16s(BONE_PALETTE_SIZE)?);

		let index_count = non_negative(br.read_i32()?, "index count")?;
		let indices_offset = non_negative(br.read_i32()?, "index buffer offset")?;
		let vertex_count = non_negative(br.read_i32()?, "vertex count")?;
		let vertex_buffer_offset = non_negative(br.read_i32()?, "vertex buffer offset")?;

		let layout = VertexLayout::resolve(version, vertex_format)?;
		trace!("mesh format {} ({:?}): {} indices at {:#X}, {} vertices at {:#X}", vertex_format, layout,
			index_count, indices_offset, vertex_count, vertex_buffer_offset);

		let indices = br.step_in(data_offset + indices_offset as u64,
			|br| br.read_u16s(index_count as usize))?;
		let vertices = br.step_in(data_offset + vertex_buffer_offset as u64,
			|br| layout.read_buffer(vertex_count as usize, br))?;

		Ok(Mesh {
			vertex_format: vertex_format,
			unk01: unk01,
			unk02: unk02,
			unk03: unk03,
			unk04: unk04,
			unk06: unk06,
			bone_indices: bone_indices,
			indices: indices,
			vertices: vertices,
		})
	}

	/// Writes the descriptor, reserving the two buffer offsets under keys unique to mesh `index`
	#[cfg(feature = "export")]
	pub(crate) fn write_header(&self, index: usize, version: i32, bw: &mut BinWriter) -> Result<(), Smd4Error> {
		let vertex_count = self.vertex_count(version)?;

		bw.write_u8(self.vertex_format)?;
		bw.write_u8(self.unk01)?;
		bw.write_u8(self.unk02)?;
		bw.write_u8(self.unk03 as u8)?;
		bw.write_u8(self.unk04 as u8)?;
		bw.write_u8(0)?;
		bw.write_i16(self.unk06)?;
		bw.write_i16s(&self.bone_indices)?;
		bw.write_i32(field_i32(self.indices.len(), "index count")?)?;
		bw.reserve_i32(indices_key(index))?;
		bw.write_i32(field_i32(vertex_count as usize, "vertex count")?)?;
		bw.reserve_i32(vertex_buffer_key(index))?;

		Ok(())
	}

	/// Writes the index and vertex buffers into the data region starting at `data_start`
	#[cfg(feature = "export")]
	pub(crate) fn write_data(&self, index: usize, version: i32, data_start: usize, bw: &mut BinWriter)
		-> Result<(), Smd4Error>
	{
		let layout = VertexLayout::resolve(version, self.vertex_format)?;

		let indices_offset = field_i32(bw.position() - data_start, "index buffer offset")?;
		bw.fill_i32(&indices_key(index), indices_offset)?;
		bw.write_u16s(&self.indices)?;
		bw.pad(VERTEX_BUFFER_ALIGN)?;

		let vertex_buffer_offset = field_i32(bw.position() - data_start, "vertex buffer offset")?;
		bw.fill_i32(&vertex_buffer_key(index), vertex_buffer_offset)?;
		layout.write_buffer(&self.vertices, bw)
	}
}

/// Iterator over the triangles of a strip, see [`Mesh::faces`]
#[derive(Clone, Debug)]
pub struct StripFaces<'a> {
	windows: Windows<'a, u16>,
	flip: bool,
	allow_primitive_restarts: bool,
	include_degenerate_faces: bool,
}

impl<'a> Iterator for StripFaces<'a> {
	type Item = [u16; 3];

	fn next(&mut self) -> Option<[u16; 3]> {
		loop {
			let window = self.windows.next()?;
			let (a, b, c) = (window[0], window[1], window[2]);

			let flip = self.flip;
			self.flip = !self.flip;

			if self.allow_primitive_restarts
				&& (a == PRIMITIVE_RESTART || b == PRIMITIVE_RESTART || c == PRIMITIVE_RESTART)
			{
				continue;
			}

			if self.include_degenerate_faces || (a != b && b != c && a != c) {
				return Some(if flip { [c, b, a] } else { [a, b, c] });
			}
		}
	}
}

#[cfg(feature = "export")]
fn indices_key(index: usize) -> String {
	format!("Mesh{}IndicesOffset", index)
}

#[cfg(feature = "export")]
fn vertex_buffer_key(index: usize) -> String {
	format!("Mesh{}VertexBufferOffset", index)
}

#[cfg(feature = "import")]
fn read_flag<R>(br: &mut BinReader<R>) -> Result<bool, Smd4Error>
where
	R: Read + Seek,
{
	match br.read_u8()? {
		0 => Ok(false),
		1 => Ok(true),
		b => Err(Smd4Error::MalformedHeader(format!("invalid mesh flag byte {:#04X}", b))),
	}
}

#[cfg(feature = "import")]
fn non_negative(value: i32, what: &str) -> Result<u32, Smd4Error> {
	if value < 0 {
		return Err(Smd4Error::MalformedHeader(format!("negative {}: {}", what, value)));
	}

	Ok(value as u32)
}
