//! COM-style binary object model for Rust.
//!
//! Objects are reached through interface pointers whose first word is a
//! pointer to a table of `extern "C"` function pointers. Interfaces form a
//! single-inheritance chain rooted at [`IUnknown`]; each derived vtable embeds
//! its parent's vtable as its first field, so a pointer to an interface is also
//! a valid pointer to every ancestor. Objects are reference counted, and
//! optionally weak-observable through [`IWeak`].
//!
//! ## Defining and implementing an interface
//! ```ignore
//! use cocom::proc::*;
//! use cocom::{ComObject, IUnknown};
//!
//! #[interface("c523bd17-e326-446c-8aab-c4e40774531a")]
//! pub trait ICalc: IUnknown {
//!     fn add(&self, a: u32, b: u32) -> u32;
//! }
//!
//! #[object(ICalc)]
//! struct Calc;
//!
//! impl ICalcImpl for Calc {
//!     fn add(&self, a: u32, b: u32) -> u32 { a + b }
//! }
//!
//! let calc = ComObject::new(Calc);
//! assert_eq!(calc.add(2, 3), 5);
//! ```
//!
//! ## Containers
//!
//! | Container | Counts | Interfaces |
//! |-----------|--------|------------|
//! | [`ComObject`] | strong | any |
//! | [`WeakObject`] | strong + weak | derived from [`IWeak`] |
//!
//! Pairing a weak-tracked interface with [`ComObject`], or a strong-only one
//! with [`WeakObject`], is a compile error.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade: vtable construction at `debug`,
//! object lifetime and failed queries at `trace`, null dereferences at `error`.

// Lets the proc-macro output (`::cocom::...`) resolve inside this crate's own tests.
extern crate self as cocom;

mod error;
mod guid;
mod hresult;
mod interface;
mod object;
mod proxy;
mod rc;

pub use error::{GuidParseError, NullPointerError};
pub use guid::{GUID_TEXT_LEN, Guid};
pub use hresult::{FACILITY_WIN32, HResult};
pub use interface::{
    Counting, Here, IID_IUNKNOWN, IID_IWEAK, IUnknown, IUnknownImpl, IUnknownVTable, IWeak,
    IWeakImpl, IWeakVTable, Inherits, Interface, StrongOnly, There, VTableLayout, WeakTracked,
};
pub use object::{ComObject, WeakObject};
pub use proxy::{Bind, Object, Outer, VTableRegistry, WeakOuter};
pub use rc::{StrongRef, WeakRef};

/// Attribute macros for declaring interfaces and implementation types.
pub mod proc {
    pub use cocom_macro::{interface, object};
}

// Re-exported for macro output
#[doc(hidden)]
pub use std::ffi::c_void;
