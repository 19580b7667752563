//! Interface views and the two root interfaces.
//!
//! An interface view is a `#[repr(C)]` struct whose only content is a pointer
//! to its vtable. A derived interface's vtable embeds its parent's vtable by
//! value as the first field (`base`), so a pointer to any interface is also a
//! valid pointer to each of its ancestors.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use crate::{Guid, HResult};

/// Layout information for an interface's vtable.
///
/// # Safety
/// `VTable` must be `#[repr(C)]` with the parent's vtable as its first field
/// and `SLOT_COUNT` must count every slot including inherited ones.
pub unsafe trait VTableLayout {
    /// Total number of slots, inherited slots included.
    const SLOT_COUNT: usize;

    type VTable: Send + Sync + 'static;
}

mod sealed {
    pub trait Sealed {}
}

/// Which reference counts an interface family supports.
pub trait Counting: sealed::Sealed + 'static {
    const WEAK: bool;
}

/// Strong references only.
pub enum StrongOnly {}

/// Strong and weak references; every interface in the family derives from [`IWeak`].
pub enum WeakTracked {}

impl sealed::Sealed for StrongOnly {}
impl sealed::Sealed for WeakTracked {}

impl Counting for StrongOnly {
    const WEAK: bool = false;
}

impl Counting for WeakTracked {
    const WEAK: bool = true;
}

/// A COM-style interface view.
///
/// Normally implemented by `#[interface]`.
///
/// # Safety
/// `Self` must be a `#[repr(C)]` struct whose first word is a pointer to a
/// `Self::VTable`, and `Parent` must be the interface whose vtable is embedded
/// first in `Self::VTable`. `Counting` must be [`WeakTracked`] only when
/// `Self` derives from [`IWeak`].
pub unsafe trait Interface: VTableLayout + Sized + 'static {
    const GUID: Guid;
    const NAME: &'static str;

    /// The interface this one extends. `()` for [`IUnknown`].
    type Parent;

    type Counting: Counting;

    /// Answer a query for `guid` against this interface and its ancestors.
    ///
    /// All views of an object share one address, so a match hands `this` back.
    fn query_chain(this: NonNull<c_void>, guid: &Guid) -> Result<NonNull<c_void>, HResult>;

    #[inline]
    fn vtable(&self) -> &Self::VTable {
        // SAFETY: the first word of every interface view is its vtable pointer.
        unsafe { &**(self as *const Self as *const *const Self::VTable) }
    }

    #[inline]
    fn as_unknown(&self) -> &IUnknown {
        // SAFETY: every interface derives from IUnknown and shares its address.
        unsafe { &*(self as *const Self as *const IUnknown) }
    }
}

/// Marker for "`Self` is `U` or derives from it", enabling zero-cost upcasts.
///
/// `I` is an inference-only index: callers write `_`.
///
/// # Safety
/// A pointer to `Self` must be usable as a pointer to `U`.
pub unsafe trait Inherits<U: Interface, I>: Interface {}

/// Index for [`Inherits`]: the target is `Self`.
pub struct Here;

/// Index for [`Inherits`]: the target is found in `Self::Parent`.
pub struct There<I>(PhantomData<I>);

unsafe impl<T: Interface> Inherits<T, Here> for T {}

unsafe impl<T, U, I> Inherits<U, There<I>> for T
where
    T: Interface,
    U: Interface,
    T::Parent: Inherits<U, I>,
{
}

// ============================================================================
// IUnknown
// ============================================================================

pub const IID_IUNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_c000_000000000046);

/// Root of every interface: identity, querying and strong counting.
#[repr(C)]
pub struct IUnknown {
    vtbl: *const IUnknownVTable,
}

#[repr(C)]
pub struct IUnknownVTable {
    pub query_interface: unsafe extern "C" fn(
        this: *const IUnknown,
        guid: *const Guid,
        out: *mut *mut c_void,
    ) -> HResult,
    /// Returns the count before the increment.
    pub add_ref: unsafe extern "C" fn(this: *const IUnknown) -> u32,
    /// Returns the count before the decrement.
    pub release: unsafe extern "C" fn(this: *const IUnknown) -> u32,
}

unsafe impl VTableLayout for IUnknown {
    const SLOT_COUNT: usize = 3;
    type VTable = IUnknownVTable;
}

unsafe impl Interface for IUnknown {
    const GUID: Guid = IID_IUNKNOWN;
    const NAME: &'static str = "IUnknown";
    type Parent = ();
    type Counting = StrongOnly;

    fn query_chain(this: NonNull<c_void>, guid: &Guid) -> Result<NonNull<c_void>, HResult> {
        if *guid == Self::GUID {
            Ok(this)
        } else {
            Err(HResult::NO_INTERFACE)
        }
    }
}

unsafe impl Send for IUnknown {}
unsafe impl Sync for IUnknown {}

impl IUnknown {
    /// Raw query. On failure `*out` is null.
    #[inline]
    pub fn query_interface(&self, guid: &Guid, out: &mut *mut c_void) -> HResult {
        unsafe { (self.vtable().query_interface)(self, guid, out) }
    }

    /// Query for `U`.
    ///
    /// The returned pointer is borrowed: no count is added, so it is valid only
    /// while `self` is. Use [`StrongRef::clone_from_raw`](crate::StrongRef::clone_from_raw)
    /// or [`StrongRef::cast`](crate::StrongRef::cast) to own a reference.
    pub fn query<U: Interface>(&self) -> Result<NonNull<U>, HResult> {
        let mut out = ptr::null_mut();
        self.query_interface(&U::GUID, &mut out).ok()?;
        NonNull::new(out.cast::<U>()).ok_or(HResult::NO_INTERFACE)
    }

    /// Returns the previous strong count.
    #[inline]
    pub fn add_ref(&self) -> u32 {
        unsafe { (self.vtable().add_ref)(self) }
    }

    /// Returns the previous strong count.
    ///
    /// # Safety
    /// Gives up a strong reference the caller owns; the object may be freed
    /// before this returns.
    #[inline]
    pub unsafe fn release(&self) -> u32 {
        unsafe { (self.vtable().release)(self) }
    }
}

impl fmt::Debug for IUnknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IUnknown").field("vtbl", &self.vtbl).finish()
    }
}

/// Implementation trait for [`IUnknown`]. Its slots are supplied by the
/// container, so every type satisfies it.
pub trait IUnknownImpl {}

impl<T: ?Sized> IUnknownImpl for T {}

// ============================================================================
// IWeak
// ============================================================================

pub const IID_IWEAK: Guid = Guid::from_u128(0x9d01e165_12b5_4190_bb46_3d78413de9a5);

/// Extends [`IUnknown`] with weak counting. Implemented only by
/// [`WeakObject`](crate::WeakObject).
#[repr(C)]
pub struct IWeak {
    base: IUnknown,
}

#[repr(C)]
pub struct IWeakVTable {
    pub base: IUnknownVTable,
    /// Returns the weak count before the increment.
    pub add_ref_weak: unsafe extern "C" fn(this: *const IWeak) -> u32,
    /// Returns the weak count before the decrement.
    pub release_weak: unsafe extern "C" fn(this: *const IWeak) -> u32,
    /// Gain a strong reference if the value is still alive.
    pub try_upgrade: unsafe extern "C" fn(this: *const IWeak) -> bool,
    /// Gain a weak reference if storage is still alive.
    pub try_downgrade: unsafe extern "C" fn(this: *const IWeak) -> bool,
}

unsafe impl VTableLayout for IWeak {
    const SLOT_COUNT: usize = <IUnknown as VTableLayout>::SLOT_COUNT + 4;
    type VTable = IWeakVTable;
}

unsafe impl Interface for IWeak {
    const GUID: Guid = IID_IWEAK;
    const NAME: &'static str = "IWeak";
    type Parent = IUnknown;
    type Counting = WeakTracked;

    fn query_chain(this: NonNull<c_void>, guid: &Guid) -> Result<NonNull<c_void>, HResult> {
        if *guid == Self::GUID {
            Ok(this)
        } else {
            IUnknown::query_chain(this, guid)
        }
    }
}

unsafe impl Send for IWeak {}
unsafe impl Sync for IWeak {}

impl Deref for IWeak {
    type Target = IUnknown;

    #[inline]
    fn deref(&self) -> &IUnknown {
        &self.base
    }
}

impl IWeak {
    /// Returns the previous weak count.
    #[inline]
    pub fn add_ref_weak(&self) -> u32 {
        unsafe { (Interface::vtable(self).add_ref_weak)(self) }
    }

    /// Returns the previous weak count.
    ///
    /// # Safety
    /// Gives up a weak reference the caller owns; storage may be freed before
    /// this returns.
    #[inline]
    pub unsafe fn release_weak(&self) -> u32 {
        unsafe { (Interface::vtable(self).release_weak)(self) }
    }

    #[inline]
    pub fn try_upgrade(&self) -> bool {
        unsafe { (Interface::vtable(self).try_upgrade)(self) }
    }

    #[inline]
    pub fn try_downgrade(&self) -> bool {
        unsafe { (Interface::vtable(self).try_downgrade)(self) }
    }
}

impl fmt::Debug for IWeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IWeak").field("vtbl", &self.base.vtbl).finish()
    }
}

/// Implementation trait for [`IWeak`]. Its slots are supplied by the container.
pub trait IWeakImpl {}

impl<T: ?Sized> IWeakImpl for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    fn assert_inherits<T: Inherits<U, I>, U: Interface, I>() {}

    #[test]
    fn test_root_layouts() {
        let ptr = size_of::<usize>();
        assert_eq!(size_of::<IUnknownVTable>(), 3 * ptr);
        assert_eq!(size_of::<IWeakVTable>(), 7 * ptr);
        assert_eq!(offset_of!(IWeakVTable, base), 0);
        assert_eq!(offset_of!(IWeakVTable, add_ref_weak), 3 * ptr);
        assert_eq!(size_of::<IUnknown>(), ptr);
        assert_eq!(size_of::<IWeak>(), ptr);
    }

    #[test]
    fn test_slot_counts() {
        assert_eq!(IUnknown::SLOT_COUNT, 3);
        assert_eq!(IWeak::SLOT_COUNT, 7);
    }

    #[test]
    fn test_counting_propagates() {
        assert!(!<IUnknown as Interface>::Counting::WEAK);
        assert!(<IWeak as Interface>::Counting::WEAK);
    }

    #[test]
    fn test_inherits() {
        assert_inherits::<IUnknown, IUnknown, _>();
        assert_inherits::<IWeak, IWeak, _>();
        assert_inherits::<IWeak, IUnknown, _>();
    }

    #[test]
    fn test_root_query_chain() {
        let dummy = NonNull::<u8>::dangling().cast::<c_void>();
        assert_eq!(IWeak::query_chain(dummy, &IID_IUNKNOWN), Ok(dummy));
        assert_eq!(IWeak::query_chain(dummy, &IID_IWEAK), Ok(dummy));
        assert_eq!(
            IUnknown::query_chain(dummy, &IID_IWEAK),
            Err(HResult::NO_INTERFACE)
        );
    }
}
