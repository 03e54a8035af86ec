use std::io;
use thiserror::Error;

use akit_core::io_ext::StreamError;

#[derive(Error, Debug)]
pub enum Smd4Error {
	#[error("Bone index out of bounds: {0}")]
	BoneIndex(i32),
	#[error("Bone {bone} has more than {max_depth} ancestors; the hierarchy may be cyclic")]
	BoneCycle {
		bone: usize,
		max_depth: usize,
	},
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Not an SMD4 model file: {0:X?}")]
	Magic(Vec<u8>),
	#[error("Malformed header: {0}")]
	MalformedHeader(String),
	#[error("{what} of {value} does not fit in a 32-bit field")]
	FieldOverflow {
		what: &'static str,
		value: usize,
	},
	#[error("Byte stream error")]
	Stream(#[source] StreamError),
	#[error("Unexpected end of data")]
	Truncated,
	#[error("Unsupported vertex layout: version {version:#X}, format {format}")]
	UnsupportedLayout {
		version: i32,
		format: u8,
	},
	#[error("Vertex buffer of {len} bytes is not a multiple of the {size} byte vertex size")]
	VertexBufferLength {
		len: usize,
		size: u32,
	},
}

impl From<StreamError> for Smd4Error {
	fn from(err: StreamError) -> Self {
		if err.is_eof() {
			return Smd4Error::Truncated;
		}

		match err {
			StreamError::Io { source } => Smd4Error::IO { source: source },
			StreamError::Ascii { found, .. } => Smd4Error::Magic(found),
			StreamError::Pattern { offset, len, value } => Smd4Error::MalformedHeader(
				format!("expected {} bytes of {:#04X} at offset {:#X}", len, value, offset)),
			other => Smd4Error::Stream(other),
		}
	}
}

/// Converts a length or offset into the signed 32-bit value the format stores
#[cfg(feature = "export")]
pub(crate) fn field_i32(value: usize, what: &'static str) -> Result<i32, Smd4Error> {
	i32::try_from(value).map_err(|_| Smd4Error::FieldOverflow {
		what: what,
		value: value,
	})
}

#[cfg(test)]
mod tests {
	use std::io;

	use super::*;

	#[test]
	fn test_stream_error_mapping() {
		let eof = StreamError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
		assert!(matches!(Smd4Error::from(eof), Smd4Error::Truncated));

		let other = StreamError::from(io::Error::from(io::ErrorKind::PermissionDenied));
		assert!(matches!(Smd4Error::from(other), Smd4Error::IO { .. }));

		let pattern = StreamError::Pattern { offset: 0x40, len: 32, value: 0 };
		assert!(matches!(Smd4Error::from(pattern), Smd4Error::MalformedHeader(_)));

		let ascii = StreamError::Ascii { expected: "SMD4".to_string(), found: b"FLVE".to_vec() };
		assert!(matches!(Smd4Error::from(ascii), Smd4Error::Magic(m) if m == b"FLVE"));

		let unresolved = StreamError::UnresolvedPlaceholders(vec!["DataSize".to_string()]);
		assert!(matches!(Smd4Error::from(unresolved), Smd4Error::Stream(_)));
	}

	#[cfg(feature = "export")]
	#[test]
	fn test_field_i32() {
		assert_eq!(field_i32(0x800, "data offset").unwrap(), 0x800);
		assert_eq!(field_i32(i32::MAX as usize, "index count").unwrap(), i32::MAX);
		assert!(matches!(field_i32(i32::MAX as usize + 1, "index count"),
			Err(Smd4Error::FieldOverflow { what: "index count", .. })));
		assert!(matches!(field_i32(usize::MAX, "bone count"), Err(Smd4Error::FieldOverflow { .. })));
	}
}
