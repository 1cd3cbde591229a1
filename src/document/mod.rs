//! Engine configuration document model and route compilation.
//!
//! # Data Flow
//! ```text
//! DomainRecord ──compile.rs──▶ RouteFragment ──┐
//!                                              ▼
//! engine admin API ◀──types.rs (serde)──── Document
//! ```
//!
//! # Design Decisions
//! - Handler stages are a tagged union discriminated on `handler`
//! - Optional wire sub-blocks are `Option<T>`, never booleans
//! - Compilation is pure; all I/O lives in `engine` and `sync`

pub mod compile;
pub mod types;

pub use compile::{compile_route, decompose_route, CompileError, DecomposeError};
pub use types::{Document, HandlerStage, RouteFragment, TransportVersion};
