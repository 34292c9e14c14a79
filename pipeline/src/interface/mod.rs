//! Binding generator: interface descriptions in, Swift and Kotlin glue out.
//!
//! The interface description is the single source of truth shared by the
//! native build and the generated bindings. Its digest is stamped into
//! generated sources and embedded in native binaries so that the two can be
//! checked against each other.

pub mod abi;
pub mod description;
pub mod error;
pub mod generator;
pub mod header;
mod kotlin;
pub mod module;
mod swift;
pub mod types;

pub use description::{InterfaceDescription, InterfaceStamp};
pub use error::BindingError;
pub use generator::{HostLanguage, generate};
pub use header::ffi_header;
pub use module::{
    BindingModule, WriteOutcome, binding_file_name, binding_path, read_stamp, verify_up_to_date,
};
pub use types::TypeRef;
