//! Shared pieces of the sample viewers: command line handling, shader sources,
//! procedural geometry and the mesh viewer application.

pub mod args;
pub mod geometry;
pub mod mesh_viewer;
pub mod shaders;
