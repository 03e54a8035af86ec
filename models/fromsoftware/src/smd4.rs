//! SMD4 model container.
//!
//! All fields are big endian, except for the unknown index list where each entry is a little
//! endian integer followed by 32 zero bytes. Mesh buffers live in a data region aligned to 0x800
//! bytes at the end of the file, and mesh descriptors address them relative to its start.

use byteorder::{
	BE,
	ByteOrder
};

#[cfg(feature = "import")]
use std::io::{
	Cursor,
	Read,
	Seek
};

#[cfg(feature = "export")]
use std::io::Write;

use log::debug;

use ultraviolet::{
	mat::Mat4,
	vec::Vec3
};

use akit_core::{
	io_ext::Endian,
	tag4
};

#[cfg(feature = "import")]
use akit_core::io_ext::{
	BinReader,
	StreamError
};

#[cfg(feature = "export")]
use akit_core::io_ext::BinWriter;

#[cfg(feature = "export")]
use crate::error::field_i32;

use crate::{
	bone::{
		Bone,
		NO_PARENT
	},
	error::Smd4Error,
	mesh::Mesh
};

pub const MAGIC: u32 = tag4!(b"SMD4");
static MAGIC_STR: &str = "SMD4";

/// Smallest file [`is_smd4`] will accept
pub const MIN_FILE_SIZE: usize = 128;
/// Size of the fixed header, reserved region included
pub const HEADER_SIZE: usize = 0x60;
/// Size of one unknown index entry: the value and its zero padding
pub const UNK_INDEX_SIZE: usize = 0x24;
/// Alignment of the data region's start and end
pub const DATA_ALIGN: usize = 0x800;
const RESERVED_LEN: usize = 32;

const DATA_OFFSET_KEY: &str = "DataOffset";
const DATA_SIZE_KEY: &str = "DataSize";

/// Returns true if `data` looks like an SMD4 model. Never fails.
pub fn is_smd4(data: &[u8]) -> bool {
	data.len() >= MIN_FILE_SIZE && BE::read_u32(&data[..4]) == MAGIC
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub version: i32,
	pub bounding_box_min: Vec3,
	pub bounding_box_max: Vec3,
	/// Informational, recomputed from the geometry on write
	pub true_face_count: i32,
	/// Informational, recomputed from the geometry on write
	pub total_face_count: i32,
}

impl Header {
	pub fn new(version: i32) -> Header {
		Header {
			version: version,
			bounding_box_min: Vec3::zero(),
			bounding_box_max: Vec3::zero(),
			true_face_count: 0,
			total_face_count: 0,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Smd4 {
	pub header: Header,
	pub unk_indices: Vec<i32>,
	pub bones: Vec<Bone>,
	pub meshes: Vec<Mesh>,
}

impl Smd4 {
	pub fn new(version: i32) -> Smd4 {
		Smd4 {
			header: Header::new(version),
			unk_indices: vec![],
			bones: vec![],
			meshes: vec![],
		}
	}

	/// Face total written to the header. This counts degenerate and restart-adjacent windows the
	/// same way the header always has, so it is not an exact triangle count.
	pub fn face_count(&self) -> u32 {
		self.meshes.iter().map(|m| m.face_count(true, true)).sum()
	}

	/// Transform of bone `index` relative to the model, following parents up to the root.
	///
	/// The parent chain is not checked for cycles; see
	/// [`world_transform_bounded`](Self::world_transform_bounded) for untrusted skeletons.
	pub fn world_transform(&self, index: usize) -> Result<Mat4, Smd4Error> {
		self.walk_parents(index, None)
	}

	/// Same as [`world_transform`](Self::world_transform), but fails once more than `max_depth`
	/// parents have been followed.
	pub fn world_transform_bounded(&self, index: usize, max_depth: usize) -> Result<Mat4, Smd4Error> {
		self.walk_parents(index, Some(max_depth))
	}

	fn walk_parents(&self, index: usize, max_depth: Option<usize>) -> Result<Mat4, Smd4Error> {
		let mut bone = self.bones.get(index).ok_or(Smd4Error::BoneIndex(index as i32))?;
		let mut result = bone.local_transform();
		let mut depth = 0;

		while bone.parent_index != NO_PARENT {
			if let Some(max) = max_depth {
				if depth >= max {
					return Err(Smd4Error::BoneCycle {
						bone: index,
						max_depth: max,
					});
				}
			}
			depth += 1;

			let parent = usize::try_from(bone.parent_index).ok()
				.and_then(|i| self.bones.get(i))
				.ok_or(Smd4Error::BoneIndex(bone.parent_index as i32))?;
			result = result * parent.local_transform();
			bone = parent;
		}

		Ok(result)
	}

	#[cfg(feature = "import")]
	pub fn from_bytes(data: &[u8]) -> Result<Smd4, Smd4Error> {
		Smd4::read(&mut Cursor::new(data))
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Smd4, Smd4Error>
	where
		R: Read + Seek,
	{
		let mut br = BinReader::new(buf);
		br.set_endian(Endian::Big);

		br.assert_ascii(MAGIC_STR)?;
		let version = br.read_i32()?;
		let data_offset = br.read_i32()?;
		let data_size = br.read_i32()?;
		let unk_index_count = br.read_i32()?;
		let bone_count = br.read_i32()?;
		let mesh_count = br.read_i32()?;

		let vertex_buffer_count = br.read_i32()?;
		if vertex_buffer_count != mesh_count {
			return Err(Smd4Error::MalformedHeader(format!(
				"vertex buffer count {} does not match mesh count {}", vertex_buffer_count, mesh_count)));
		}

		if data_offset < 0 || unk_index_count < 0 || bone_count < 0 || mesh_count < 0 {
			return Err(Smd4Error::MalformedHeader(format!(
				"negative offset or count: data {}, unknown indices {}, bones {}, meshes {}",
				data_offset, unk_index_count, bone_count, mesh_count)));
		}

		let header = Header {
			version: version,
			bounding_box_min: br.read_vec3()?,
			bounding_box_max: br.read_vec3()?,
			true_face_count: br.read_i32()?,
			total_face_count: br.read_i32()?,
		};
		br.assert_pattern(RESERVED_LEN, 0)?;

		debug!("SMD4 version {:#X}: {} unknown indices, {} bones, {} meshes, data at {:#X} ({:#X} bytes)",
			version, unk_index_count, bone_count, mesh_count, data_offset, data_size);

		let mut unk_indices = vec![];
		for _ in 0..unk_index_count {
			let value = br.with_endian(Endian::Little, |br| -> Result<i32, StreamError> {
				let value = br.read_i32()?;
				br.assert_pattern(RESERVED_LEN, 0)?;
				Ok(value)
			})?;
			unk_indices.push(value);
		}

		let mut bones = vec![];
		for _ in 0..bone_count {
			bones.push(Bone::read(&mut br)?);
		}

		let mut meshes = vec![];
		for _ in 0..mesh_count {
			meshes.push(Mesh::read(version, data_offset as u64, &mut br)?);
		}

		Ok(Smd4 {
			header: header,
			unk_indices: unk_indices,
			bones: bones,
			meshes: meshes,
		})
	}

	/// Serializes the whole model. Nothing reaches `buf` unless serialization succeeds.
	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), Smd4Error>
	where
		W: Write,
	{
		let data = self.to_bytes()?;
		buf.write_all(&data)?;

		Ok(())
	}

	#[cfg(feature = "export")]
	pub fn to_bytes(&self) -> Result<Vec<u8>, Smd4Error> {
		let mut bw = BinWriter::new(Endian::Big);
		self.write_into(&mut bw)?;

		Ok(bw.finish()?)
	}

	#[cfg(feature = "export")]
	fn write_into(&self, bw: &mut BinWriter) -> Result<(), Smd4Error> {
		let version = self.header.version;
		let (true_face_count, total_face_count) = header_face_counts(self.face_count());

		debug!("writing SMD4 version {:#X}: {} bones, {} meshes, {} faces", version, self.bones.len(),
			self.meshes.len(), true_face_count);

		bw.write_ascii(MAGIC_STR)?;
		bw.write_i32(version)?;
		bw.reserve_i32(DATA_OFFSET_KEY)?;
		bw.reserve_i32(DATA_SIZE_KEY)?;
		let mesh_count = field_i32(self.meshes.len(), "mesh count")?;
		bw.write_i32(field_i32(self.unk_indices.len(), "unknown index count")?)?;
		bw.write_i32(field_i32(self.bones.len(), "bone count")?)?;
		bw.write_i32(mesh_count)?;
		bw.write_i32(mesh_count)?;
		bw.write_vec3(self.header.bounding_box_min)?;
		bw.write_vec3(self.header.bounding_box_max)?;
		bw.write_i32(true_face_count)?;
		bw.write_i32(total_face_count)?;
		bw.write_pattern(RESERVED_LEN, 0)?;

		for value in self.unk_indices.iter() {
			bw.with_endian(Endian::Little, |bw| {
				bw.write_i32(*value)?;
				bw.write_pattern(RESERVED_LEN, 0)
			})?;
		}

		for bone in self.bones.iter() {
			bone.write(bw)?;
		}

		for (i, mesh) in self.meshes.iter().enumerate() {
			mesh.write_header(i, version, bw)?;
		}

		bw.pad(DATA_ALIGN)?;
		let data_start = bw.position();
		bw.fill_i32(DATA_OFFSET_KEY, field_i32(data_start, "data offset")?)?;

		for (i, mesh) in self.meshes.iter().enumerate() {
			mesh.write_data(i, version, data_start, bw)?;
		}

		bw.pad(DATA_ALIGN)?;
		let data_size = bw.position() - data_start;
		bw.fill_i32(DATA_SIZE_KEY, field_i32(data_size, "data size")?)?;

		Ok(())
	}
}

/// Header face counts for `faces` triangles. Both are informational, so they saturate rather than
/// fail.
#[cfg(feature = "export")]
fn header_face_counts(faces: u32) -> (i32, i32) {
	let true_face_count = i32::try_from(faces).unwrap_or(i32::MAX);
	(true_face_count, true_face_count.saturating_mul(3))
}

impl Default for Smd4 {
	fn default() -> Self {
		Smd4::new(crate::vertex::VERSION_40001)
	}
}

#[cfg(test)]
mod tests {
	use byteorder::{
		BE,
		ByteOrder,
		LE
	};

	use ultraviolet::vec::Vec3;

	use crate::{
		bone::{
			Bone,
			BONE_SIZE,
			transform_point
		},
		mesh::{
			Mesh,
			MESH_SIZE
		},
		vertex::VERSION_40001
	};

	use super::*;

	fn init() {
		let _ = env_logger::builder().is_test(true).try_init();
	}

	fn sample_model() -> Smd4 {
		let mut model = Smd4::new(VERSION_40001);
		model.header.bounding_box_min = Vec3::new(-1.0, -2.0, -3.0);
		model.header.bounding_box_max = Vec3::new(1.0, 2.0, 3.0);
		model.unk_indices = vec![0x01020304];

		model.bones.push(Bone {
			translation: Vec3::new(0.0, 1.5, 0.0),
			child_index: 1,
			bounding_box_max: Vec3::new(0.5, 0.5, 0.5),
			..Bone::default()
		});
		model.bones.push(Bone {
			translation: Vec3::new(0.25, 0.0, 0.0),
			rotation: Vec3::new(0.1, 0.2, 0.3),
			scale: Vec3::new(1.0, 2.0, 1.0),
			parent_index: 0,
			..Bone::default()
		});

		let mut compact = Mesh::new(0);
		compact.unk01 = 3;
		compact.unk03 = true;
		compact.unk06 = -7;
		compact.bone_indices[0] = 0;
		compact.bone_indices[1] = 1;
		compact.indices = vec![0, 1, 2, 3, 0xFFFF, 2, 3, 4];
		compact.vertices = (0..80).map(|b| b as u8).collect();
		model.meshes.push(compact);

		let mut extended = Mesh::new(2);
		extended.unk02 = 0x80;
		extended.unk04 = true;
		extended.bone_indices[27] = 1;
		extended.indices = vec![0, 1, 2];
		extended.vertices = vec![0xAB; 108];
		model.meshes.push(extended);

		model
	}

	fn read_i32_at(data: &[u8], offset: usize) -> i32 {
		BE::read_i32(&data[offset..offset + 4])
	}

	#[test]
	fn test_is_smd4() {
		let mut data = vec![0; MIN_FILE_SIZE];
		assert!(!is_smd4(&data));

		data[..4].copy_from_slice(b"SMD4");
		assert!(is_smd4(&data));
		assert!(!is_smd4(&data[..MIN_FILE_SIZE - 1]));
		assert!(!is_smd4(b"SMD4"));
		assert!(!is_smd4(&[]));
	}

	#[test]
	fn test_round_trip() {
		init();

		let model = sample_model();
		let data = model.to_bytes().unwrap();
		assert!(is_smd4(&data));

		let parsed = Smd4::from_bytes(&data).unwrap();
		assert_eq!(parsed.header.true_face_count, 4);
		assert_eq!(parsed.header.total_face_count, 12);

		let mut expected = model.clone();
		expected.header.true_face_count = 4;
		expected.header.total_face_count = 12;
		assert_eq!(parsed, expected);

		// derived fields are recomputed, so a second pass is byte identical
		assert_eq!(parsed.to_bytes().unwrap(), data);
	}

	#[test]
	fn test_layout() {
		let data = sample_model().to_bytes().unwrap();

		assert_eq!(&data[..4], b"SMD4");
		assert_eq!(read_i32_at(&data, 0x04), VERSION_40001);
		assert_eq!(read_i32_at(&data, 0x08), 0x800);
		assert_eq!(read_i32_at(&data, 0x0C), 0x800);
		assert_eq!(read_i32_at(&data, 0x18), 2);
		assert_eq!(read_i32_at(&data, 0x1C), 2);
		assert!(data[0x40..HEADER_SIZE].iter().all(|b| *b == 0));
		assert_eq!(data.len(), 0x1000);
		assert_eq!(data.len() % DATA_ALIGN, 0);

		// the unknown index is little endian inside an otherwise big endian file
		assert_eq!(LE::read_i32(&data[HEADER_SIZE..HEADER_SIZE + 4]), 0x01020304);

		let desc = HEADER_SIZE + UNK_INDEX_SIZE + 2 * BONE_SIZE;
		assert_eq!(read_i32_at(&data, desc + 0x40), 8);
		assert_eq!(read_i32_at(&data, desc + 0x44), 0);
		assert_eq!(read_i32_at(&data, desc + 0x48), 5);
		assert_eq!(read_i32_at(&data, desc + 0x4C), 0x10);

		let desc = desc + MESH_SIZE;
		assert_eq!(read_i32_at(&data, desc + 0x40), 3);
		assert_eq!(read_i32_at(&data, desc + 0x44), 0x60);
		assert_eq!(read_i32_at(&data, desc + 0x48), 3);
		assert_eq!(read_i32_at(&data, desc + 0x4C), 0x70);
		assert_eq!(&data[0x870..0x874], &[0xAB; 4]);
	}

	#[test]
	fn test_placeholders_resolved() {
		let model = sample_model();
		let mut bw = BinWriter::new(Endian::Big);
		model.write_into(&mut bw).unwrap();

		// data offset and size, then two offsets per mesh
		assert_eq!(bw.reserved_total(), 2 + 2 * model.meshes.len());
		assert!(bw.pending().is_empty());
		assert!(bw.finish().is_ok());
	}

	#[test]
	fn test_empty_model() {
		let model = Smd4::default();
		let data = model.to_bytes().unwrap();

		assert_eq!(data.len(), DATA_ALIGN);
		assert_eq!(read_i32_at(&data, 0x08), 0x800);
		assert_eq!(read_i32_at(&data, 0x0C), 0);
		assert_eq!(Smd4::from_bytes(&data).unwrap(), model);
	}

	#[test]
	fn test_write_unsupported_layout() {
		let mut model = sample_model();
		model.meshes[1].vertex_format = 1;

		let mut out = vec![];
		assert!(matches!(model.write(&mut out),
			Err(Smd4Error::UnsupportedLayout { version: VERSION_40001, format: 1 })));
		assert!(out.is_empty());
	}

	#[test]
	fn test_write_bad_vertex_buffer() {
		let mut model = sample_model();
		model.meshes[0].vertices.pop();

		assert!(matches!(model.to_bytes(), Err(Smd4Error::VertexBufferLength { len: 79, size: 16 })));
	}

	#[test]
	fn test_read_unsupported_version() {
		let mut data = sample_model().to_bytes().unwrap();
		BE::write_i32(&mut data[0x04..0x08], 0x40002);

		assert!(matches!(Smd4::from_bytes(&data),
			Err(Smd4Error::UnsupportedLayout { version: 0x40002, format: 0 })));

		// without meshes there is no vertex layout to reject
		let mut empty = Smd4::new(0x40002);
		empty.bones.push(Bone::default());
		let parsed = Smd4::from_bytes(&empty.to_bytes().unwrap()).unwrap();
		assert_eq!(parsed, empty);
	}

	#[test]
	fn test_read_bad_magic() {
		let mut data = sample_model().to_bytes().unwrap();
		data[..4].copy_from_slice(b"SMD3");

		assert!(matches!(Smd4::from_bytes(&data), Err(Smd4Error::Magic(m)) if m == b"SMD3"));
	}

	#[test]
	fn test_read_vertex_buffer_count_mismatch() {
		let mut data = sample_model().to_bytes().unwrap();
		BE::write_i32(&mut data[0x1C..0x20], 1);

		assert!(matches!(Smd4::from_bytes(&data), Err(Smd4Error::MalformedHeader(_))));
	}

	#[test]
	fn test_read_reserved_not_zero() {
		let mut data = sample_model().to_bytes().unwrap();
		data[0x50] = 1;

		assert!(matches!(Smd4::from_bytes(&data), Err(Smd4Error::MalformedHeader(_))));
	}

	#[test]
	fn test_read_bad_mesh_flag() {
		let mut data = sample_model().to_bytes().unwrap();
		let desc = HEADER_SIZE + UNK_INDEX_SIZE + 2 * BONE_SIZE;
		data[desc + 3] = 2;

		assert!(matches!(Smd4::from_bytes(&data), Err(Smd4Error::MalformedHeader(_))));
	}

	#[test]
	fn test_read_truncated() {
		let data = sample_model().to_bytes().unwrap();

		assert!(matches!(Smd4::from_bytes(&data[..0x30]), Err(Smd4Error::Truncated)));
		assert!(matches!(Smd4::from_bytes(&data[..0x820]), Err(Smd4Error::Truncated)));
	}

	#[test]
	fn test_read_huge_counts() {
		let data = sample_model().to_bytes().unwrap();
		let desc = HEADER_SIZE + UNK_INDEX_SIZE + 2 * BONE_SIZE + MESH_SIZE;

		let mut huge_vertices = data.clone();
		BE::write_i32(&mut huge_vertices[desc + 0x48..desc + 0x4C], 0x7FFF_FFFF);
		assert!(matches!(Smd4::from_bytes(&huge_vertices), Err(Smd4Error::Truncated)));

		let mut huge_indices = data.clone();
		BE::write_i32(&mut huge_indices[desc + 0x40..desc + 0x44], 0x7FFF_FFFF);
		assert!(matches!(Smd4::from_bytes(&huge_indices), Err(Smd4Error::Truncated)));
	}

	#[test]
	fn test_header_face_counts() {
		assert_eq!(header_face_counts(4), (4, 12));
		assert_eq!(header_face_counts(0x3000_0000), (0x3000_0000, i32::MAX));
		assert_eq!(header_face_counts(u32::MAX), (i32::MAX, i32::MAX));
	}

	#[test]
	fn test_world_transform_chain() {
		let model = sample_model();
		let root = &model.bones[0];
		let child = &model.bones[1];

		assert_eq!(model.world_transform(0).unwrap(), root.local_transform());
		assert_eq!(model.world_transform(1).unwrap(), child.local_transform() * root.local_transform());
	}

	#[test]
	fn test_world_transform_translation() {
		let mut model = Smd4::default();
		model.bones.push(Bone {
			translation: Vec3::new(1.0, 0.0, 0.0),
			..Bone::default()
		});
		model.bones.push(Bone {
			translation: Vec3::new(0.0, 2.0, 0.0),
			parent_index: 0,
			..Bone::default()
		});

		let origin = transform_point(model.world_transform(1).unwrap(), Vec3::zero());
		assert_eq!(origin, Vec3::new(1.0, 2.0, 0.0));
	}

	#[test]
	fn test_world_transform_bad_index() {
		let mut model = sample_model();
		assert!(matches!(model.world_transform(5), Err(Smd4Error::BoneIndex(5))));

		model.bones[1].parent_index = 9;
		assert!(matches!(model.world_transform(1), Err(Smd4Error::BoneIndex(9))));
	}

	#[test]
	fn test_world_transform_bounded() {
		let mut model = sample_model();
		assert!(model.world_transform_bounded(1, 1).is_ok());
		assert!(matches!(model.world_transform_bounded(1, 0),
			Err(Smd4Error::BoneCycle { bone: 1, max_depth: 0 })));

		model.bones[0].parent_index = 1;
		assert!(matches!(model.world_transform_bounded(1, 64),
			Err(Smd4Error::BoneCycle { bone: 1, max_depth: 64 })));
	}

	#[test]
	fn test_deep_copy() {
		let model = sample_model();
		let mut copy = model.clone();
		copy.meshes[0].bone_indices[0] = 12;
		copy.meshes[0].indices.push(9);
		copy.meshes[1].vertices[0] = 0;

		assert_eq!(model.meshes[0].bone_indices[0], 0);
		assert_eq!(model.meshes[0].indices.len(), 8);
		assert_eq!(model.meshes[1].vertices[0], 0xAB);
	}
}
