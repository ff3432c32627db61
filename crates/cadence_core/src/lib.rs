//! Cadence Core
//!
//! The boundary types shared between the animation engine and its host:
//!
//! - **Targets**: opaque [`TargetId`] handles and the [`PropertySink`] trait
//!   through which every property is read and written
//! - **Values**: [`RawValue`] as stored on targets, and the [`ValueCodec`]
//!   that decomposes values into interpolatable numbers
//! - **Units**: fixed and measured unit conversion
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{CssCodec, MemorySink, PropertyKind, PropertySink, RawValue, TargetId, ValueCodec};
//!
//! let box_el = TargetId(1);
//! let sink = MemorySink::new().with(box_el, "width", PropertyKind::Style, "10px");
//!
//! let kind = sink.resolve(box_el, "width").unwrap();
//! let raw = sink.read(box_el, "width", kind).unwrap();
//! let mut value = CssCodec.decompose(&raw).unwrap();
//! value.number = 15.0;
//! assert_eq!(CssCodec.recompose(&value), RawValue::from("15px"));
//! ```

pub mod color;
pub mod error;
pub mod target;
pub mod units;
pub mod value;

pub use error::ValueError;
pub use target::{MemorySink, PropertyKind, PropertySink, TargetId};
pub use units::UnitConverter;
pub use value::{format_number, CssCodec, Decomposed, Operator, RawValue, ValueCodec, ValueKind};
