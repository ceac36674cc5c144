//! Reading and writing of the plain-text formats used by the model.
//!
//! - Mesh graphs and sample-to-full GID maps ([`mesh_file`]).
//! - Dense matrices such as bases and snapshot matrices, stored as ASCII tables ([`ascii`]).
pub mod ascii;
pub mod mesh_file;

pub use ascii::{load_basis, parse_ascii_matrix, read_ascii_matrix, save_ascii_matrix, write_ascii_matrix};
pub use mesh_file::{
    load_mesh_from_file, load_sample_to_full_map, parse_mesh, parse_sample_to_full_map, save_mesh_to_file,
    save_sample_to_full_map, write_mesh, write_sample_to_full_map, MeshLoadError,
};
