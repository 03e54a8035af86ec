#[cfg(feature = "import")]
use std::io::{
	Read,
	Seek
};

use ultraviolet::{
	mat::Mat4,
	vec::{
		Vec3,
		Vec4
	}
};

#[cfg(feature = "import")]
use akit_core::io_ext::BinReader;

#[cfg(feature = "export")]
use akit_core::io_ext::BinWriter;

use crate::error::Smd4Error;

/// Size of a bone record in bytes
pub const BONE_SIZE: usize = 0x50;
const BONE_RESERVED_LEN: usize = 12;

/// Parent index of a root bone
pub const NO_PARENT: i16 = -1;

/// A node of the skeleton. Bones refer to each other by index into [`Smd4::bones`](crate::Smd4::bones).
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
	pub translation: Vec3,
	/// Euler angles in radians, applied X, then Z, then Y
	pub rotation: Vec3,
	pub scale: Vec3,
	pub parent_index: i16,
	pub child_index: i16,
	pub next_sibling_index: i16,
	pub previous_sibling_index: i16,
	pub bounding_box_min: Vec3,
	pub bounding_box_max: Vec3,
}

impl Default for Bone {
	fn default() -> Self {
		Bone {
			translation: Vec3::zero(),
			rotation: Vec3::zero(),
			scale: Vec3::one(),
			parent_index: NO_PARENT,
			child_index: -1,
			next_sibling_index: -1,
			previous_sibling_index: -1,
			bounding_box_min: Vec3::zero(),
			bounding_box_max: Vec3::zero(),
		}
	}
}

impl Bone {
	/// Composes scale, rotation and translation into this bone's transform relative to its parent.
	///
	/// Matrices use the row vector convention: a point is transformed as `p * m`, so in `a * b`
	/// the transform `a` is applied first.
	pub fn local_transform(&self) -> Mat4 {
		scale_matrix(self.scale)
			* rotation_x(self.rotation.x)
			* rotation_z(self.rotation.z)
			* rotation_y(self.rotation.y)
			* translation_matrix(self.translation)
	}

	#[cfg(feature = "import")]
	pub(crate) fn read<R>(br: &mut BinReader<R>) -> Result<Bone, Smd4Error>
	where
		R: Read + Seek,
	{
		let bone = Bone {
			translation: br.read_vec3()?,
			rotation: br.read_vec3()?,
			scale: br.read_vec3()?,
			parent_index: br.read_i16()?,
			child_index: br.read_i16()?,
			next_sibling_index: br.read_i16()?,
			previous_sibling_index: br.read_i16()?,
			bounding_box_min: br.read_vec3()?,
			bounding_box_max: br.read_vec3()?,
		};
		br.assert_pattern(BONE_RESERVED_LEN, 0)?;

		Ok(bone)
	}

	#[cfg(feature = "export")]
	pub(crate) fn write(&self, bw: &mut BinWriter) -> Result<(), Smd4Error> {
		bw.write_vec3(self.translation)?;
		bw.write_vec3(self.rotation)?;
		bw.write_vec3(self.scale)?;
		bw.write_i16(self.parent_index)?;
		bw.write_i16(self.child_index)?;
		bw.write_i16(self.next_sibling_index)?;
		bw.write_i16(self.previous_sibling_index)?;
		bw.write_vec3(self.bounding_box_min)?;
		bw.write_vec3(self.bounding_box_max)?;
		bw.write_pattern(BONE_RESERVED_LEN, 0)?;

		Ok(())
	}
}

/// Transforms a point by a row vector convention matrix
pub fn transform_point(m: Mat4, p: Vec3) -> Vec3 {
	let v = Vec4::new(p.x, p.y, p.z, 1.0);
	Vec3::new(v.dot(m.cols[0]), v.dot(m.cols[1]), v.dot(m.cols[2]))
}

fn scale_matrix(s: Vec3) -> Mat4 {
	Mat4::new(
		Vec4::new(s.x, 0.0, 0.0, 0.0),
		Vec4::new(0.0, s.y, 0.0, 0.0),
		Vec4::new(0.0, 0.0, s.z, 0.0),
		Vec4::new(0.0, 0.0, 0.0, 1.0))
}

fn translation_matrix(t: Vec3) -> Mat4 {
	Mat4::new(
		Vec4::new(1.0, 0.0, 0.0, t.x),
		Vec4::new(0.0, 1.0, 0.0, t.y),
		Vec4::new(0.0, 0.0, 1.0, t.z),
		Vec4::new(0.0, 0.0, 0.0, 1.0))
}

fn rotation_x(angle: f32) -> Mat4 {
	let (s, c) = angle.sin_cos();
	Mat4::new(
		Vec4::new(1.0, 0.0, 0.0, 0.0),
		Vec4::new(0.0, c, -s, 0.0),
		Vec4::new(0.0, s, c, 0.0),
		Vec4::new(0.0, 0.0, 0.0, 1.0))
}

fn rotation_y(angle: f32) -> Mat4 {
	let (s, c) = angle.sin_cos();
	Mat4::new(
		Vec4::new(c, 0.0, s, 0.0),
		Vec4::new(0.0, 1.0, 0.0, 0.0),
		Vec4::new(-s, 0.0, c, 0.0),
		Vec4::new(0.0, 0.0, 0.0, 1.0))
}

fn rotation_z(angle: f32) -> Mat4 {
	let (s, c) = angle.sin_cos();
	Mat4::new(
		Vec4::new(c, -s, 0.0, 0.0),
		Vec4::new(s, c, 0.0, 0.0),
		Vec4::new(0.0, 0.0, 1.0, 0.0),
		Vec4::new(0.0, 0.0, 0.0, 1.0))
}
