pub mod bone;
pub mod error;
pub mod mesh;
pub mod smd4;
pub mod vertex;

pub use error::Smd4Error;
pub use smd4::{
	is_smd4,
	Smd4
};
