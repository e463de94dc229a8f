//! Computed fields: a graph of field definitions evaluated and differentiated over the elements
//! and nodes of a finite element mesh.
//!
//! A [`FieldModule`](module::FieldModule) owns the fields of a mesh. Fields are created from
//! [`FieldDefinition`](field::FieldDefinition)s whose sources are other fields, and evaluated at
//! [`FieldLocation`](location::FieldLocation)s through a [`FieldCache`](cache::FieldCache).
//! The [`snake`] module fits chains of cubic Hermite elements to sampled field data.
pub mod basis;
pub mod cache;
pub mod coordinates;
pub mod error;
pub mod field;
pub mod interpolate;
pub mod location;
pub mod mesh;
pub mod module;
pub mod quadrature;
pub mod snake;

pub mod linalg {
    pub use zincfield_linalg::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub use error::{FieldError, Result};
pub use zincfield_traits::Real;

pub extern crate nalgebra;
