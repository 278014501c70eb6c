#![deny(warnings)]
#![deny(clippy::all, clippy::pedantic, clippy::perf, clippy::suspicious)] // Catch correctness + perf + suspicious patterns early.
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

//! Field layout for a managed type system that shares compiled code across generic
//! instantiations.
//!
//! Layout questions are routed by type category: ordinary types are packed by
//! [`layout::ConcreteFieldLayoutAlgorithm`], while runtime-determined placeholders answer
//! through their canonical type via [`layout::RuntimeDeterminedFieldLayoutAlgorithm`] and
//! refuse anything that would expose instantiation-specific offsets.

pub mod error;
pub mod layout;
pub mod logging;
pub mod target;
pub mod type_system;

pub use error::{Error, LayoutOperation, Result};
pub use target::Target;
pub use type_system::{TypeId, TypeSystemContext};
