//! Metadata extraction: raw schema facts to the per-table model.
//!
//! - [`types`]: native type → semantic type
//! - [`naming`]: schema identifiers → code identifiers
//! - [`enums`]: enumerated-value columns
//! - [`relations`]: foreign keys → associations
//! - [`assembler`]: the per-table state machine tying them together

pub mod assembler;
pub mod enums;
pub mod model;
pub mod naming;
pub mod relations;
pub mod types;

pub use assembler::{Assembly, AssemblyOptions, MetadataAssembler, TableState};
pub use model::{
    AssociationDescriptor, AssociationTarget, ColumnDescriptor, ColumnPair, DefaultValue, EnumCase,
    EnumDescriptor, TableDescriptor, TableId,
};
pub use naming::{IdentCase, NameScope, NamingPolicy};
pub use types::{SemanticType, TypeMap, TypeMapping};
