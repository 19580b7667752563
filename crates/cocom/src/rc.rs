//! Owning smart references.
//!
//! [`StrongRef`] owns one strong count and [`WeakRef`] one weak count on an
//! object reached through an interface pointer. Both may be null; equality
//! and hashing compare addresses, never contents.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::{self, ManuallyDrop};
use std::ops::Deref;
use std::ptr::{self, NonNull};

use crate::HResult;
use crate::error::NullPointerError;
use crate::interface::{IUnknown, IWeak, Inherits, Interface, WeakTracked};

#[inline]
fn unknown<'a, T: Interface>(ptr: NonNull<T>) -> &'a IUnknown {
    // SAFETY: every interface view shares its address with its IUnknown view.
    unsafe { ptr.cast::<IUnknown>().as_ref() }
}

#[inline]
fn weak_view<'a, T: Interface<Counting = WeakTracked>>(ptr: NonNull<T>) -> &'a IWeak {
    // SAFETY: weak-tracked interfaces all derive from IWeak.
    unsafe { ptr.cast::<IWeak>().as_ref() }
}

#[cold]
#[track_caller]
fn null_dereference<T: Interface>() -> ! {
    let err = NullPointerError::new(T::NAME);
    log::error!("{err}");
    panic!("{err}")
}

// ============================================================================
// StrongRef
// ============================================================================

/// Owns one strong reference on an object viewed as `T`.
#[repr(transparent)]
pub struct StrongRef<T: Interface> {
    ptr: Option<NonNull<T>>,
}

// SAFETY: the counts are atomic and objects are required to be Send + Sync.
unsafe impl<T: Interface + Send + Sync> Send for StrongRef<T> {}
unsafe impl<T: Interface + Send + Sync> Sync for StrongRef<T> {}

impl<T: Interface> StrongRef<T> {
    /// A reference to nothing.
    #[must_use]
    pub const fn null() -> Self {
        Self { ptr: None }
    }

    /// Adopt a strong reference the caller already owns. Counts are unchanged.
    ///
    /// # Safety
    /// `ptr` must be null or an interface pointer carrying one strong reference
    /// that is transferred to the result.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            ptr: NonNull::new(ptr),
        }
    }

    /// Take a new strong reference on `ptr`, leaving the caller's untouched.
    ///
    /// # Safety
    /// `ptr` must be null or a live interface pointer.
    pub unsafe fn clone_from_raw(ptr: *mut T) -> Self {
        let ptr = NonNull::new(ptr);
        if let Some(p) = ptr {
            unknown(p).add_ref();
        }
        Self { ptr }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Give up ownership without releasing. Inverse of [`StrongRef::from_raw`].
    #[must_use = "the returned pointer owns a strong reference"]
    pub fn into_raw(self) -> *mut T {
        ManuallyDrop::new(self).as_ptr()
    }

    /// Move the reference out, leaving `self` null.
    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
        }
    }

    /// Release the reference (if any) and become null.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-null StrongRef keeps the object alive.
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    /// Checked access that reports a null reference instead of panicking.
    pub fn try_deref(&self) -> Result<&T, NullPointerError> {
        self.get().ok_or_else(|| NullPointerError::new(T::NAME))
    }

    /// View as an ancestor interface. Never fails and never touches counts.
    pub fn upcast<U: Interface, I>(self) -> StrongRef<U>
    where
        T: Inherits<U, I>,
    {
        let this = ManuallyDrop::new(self);
        StrongRef {
            ptr: this.ptr.map(NonNull::cast),
        }
    }

    /// A new strong reference typed as an ancestor interface.
    pub fn upcast_ref<U: Interface, I>(&self) -> StrongRef<U>
    where
        T: Inherits<U, I>,
    {
        self.clone().upcast()
    }

    /// Query for `U` and take a new strong reference on the result.
    pub fn cast<U: Interface>(&self) -> Result<StrongRef<U>, HResult> {
        let Some(p) = self.ptr else {
            return Err(HResult::INVALID_POINTER);
        };
        let found = unknown(p).query::<U>()?;
        // SAFETY: the query returned a live pointer into the same object.
        Ok(unsafe { StrongRef::clone_from_raw(found.as_ptr()) })
    }

    /// Like [`StrongRef::cast`] but yields null on failure.
    pub fn try_cast<U: Interface>(&self) -> StrongRef<U> {
        self.cast().unwrap_or_default()
    }
}

impl<T: Interface<Counting = WeakTracked>> StrongRef<T> {
    /// A weak observer of the same object, or null if `self` is null.
    pub fn downgrade(&self) -> WeakRef<T> {
        match self.ptr {
            Some(p) if weak_view(p).try_downgrade() => WeakRef { ptr: Some(p) },
            _ => WeakRef::null(),
        }
    }
}

impl<T: Interface> Default for StrongRef<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: Interface> Clone for StrongRef<T> {
    fn clone(&self) -> Self {
        if let Some(p) = self.ptr {
            unknown(p).add_ref();
        }
        Self { ptr: self.ptr }
    }
}

impl<T: Interface> Drop for StrongRef<T> {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: we own this strong reference.
            unsafe {
                unknown(p).release();
            }
        }
    }
}

impl<T: Interface> Deref for StrongRef<T> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => null_dereference::<T>(),
        }
    }
}

impl<T: Interface> PartialEq for StrongRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: Interface> Eq for StrongRef<T> {}

impl<T: Interface> Hash for StrongRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T: Interface> fmt::Debug for StrongRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrongRef<{}>({:p})", T::NAME, self.as_ptr())
    }
}

impl<T: Interface> fmt::Pointer for StrongRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

// ============================================================================
// WeakRef
// ============================================================================

/// Owns one weak reference on an object viewed as `T`.
///
/// Keeps the storage alive but not the value; [`WeakRef::upgrade`] must
/// succeed before the object can be used.
#[repr(transparent)]
pub struct WeakRef<T: Interface<Counting = WeakTracked>> {
    ptr: Option<NonNull<T>>,
}

unsafe impl<T: Interface<Counting = WeakTracked> + Send + Sync> Send for WeakRef<T> {}
unsafe impl<T: Interface<Counting = WeakTracked> + Send + Sync> Sync for WeakRef<T> {}

impl<T: Interface<Counting = WeakTracked>> WeakRef<T> {
    #[must_use]
    pub const fn null() -> Self {
        Self { ptr: None }
    }

    /// Adopt a weak reference the caller already owns.
    ///
    /// # Safety
    /// `ptr` must be null or an interface pointer carrying one weak reference
    /// that is transferred to the result.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            ptr: NonNull::new(ptr),
        }
    }

    /// Take a new weak reference on an object the caller holds strongly.
    ///
    /// # Safety
    /// `ptr` must be null or a live interface pointer.
    pub unsafe fn downgrade_from_raw(ptr: *mut T) -> Self {
        let ptr = NonNull::new(ptr);
        if let Some(p) = ptr {
            weak_view(p).add_ref_weak();
        }
        Self { ptr }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    #[must_use = "the returned pointer owns a weak reference"]
    pub fn into_raw(self) -> *mut T {
        ManuallyDrop::new(self).as_ptr()
    }

    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
        }
    }

    pub fn reset(&mut self) {
        drop(self.take());
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// A strong reference if the value is still alive, null otherwise.
    pub fn upgrade(&self) -> StrongRef<T> {
        match self.ptr {
            Some(p) if weak_view(p).try_upgrade() => StrongRef { ptr: Some(p) },
            _ => StrongRef::null(),
        }
    }

    /// View as an ancestor weak-tracked interface.
    pub fn upcast<U, I>(self) -> WeakRef<U>
    where
        U: Interface<Counting = WeakTracked>,
        T: Inherits<U, I>,
    {
        let this = ManuallyDrop::new(self);
        WeakRef {
            ptr: this.ptr.map(NonNull::cast),
        }
    }
}

impl<T: Interface<Counting = WeakTracked>> Default for WeakRef<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: Interface<Counting = WeakTracked>> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        if let Some(p) = self.ptr {
            weak_view(p).add_ref_weak();
        }
        Self { ptr: self.ptr }
    }
}

impl<T: Interface<Counting = WeakTracked>> Drop for WeakRef<T> {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: we own this weak reference.
            unsafe {
                weak_view(p).release_weak();
            }
        }
    }
}

impl<T: Interface<Counting = WeakTracked>> PartialEq for WeakRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: Interface<Counting = WeakTracked>> Eq for WeakRef<T> {}

impl<T: Interface<Counting = WeakTracked>> Hash for WeakRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T: Interface<Counting = WeakTracked>> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakRef<{}>({:p})", T::NAME, self.as_ptr())
    }
}
