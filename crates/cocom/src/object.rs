//! Reference-counted containers for implementation values.
//!
//! Both containers start with the vtable pointer, so the address of a
//! container is also the address of every interface view of its value.

use std::any::type_name;
use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::fmt;
use std::mem::{ManuallyDrop, offset_of};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering, fence};

use crate::interface::{Interface, VTableLayout, WeakTracked};
use crate::proxy::{Bind, Object, Outer, VTableRegistry, WeakOuter};
use crate::rc::{StrongRef, WeakRef};

type VTableOf<T> = <<T as Object>::Interface as VTableLayout>::VTable;

/// Largest count an increment may start from. Leaked references past this
/// abort the process instead of wrapping the count back to zero.
const MAX_COUNT: u32 = i32::MAX as u32;

#[inline]
fn checked_increment(prev: u32) -> u32 {
    if prev > MAX_COUNT {
        log::error!("reference count overflow ({prev}), aborting");
        std::process::abort();
    }
    prev
}

// ============================================================================
// ComObject
// ============================================================================

/// Strong-only container. The value is destroyed and the storage freed on the
/// release that takes the count from 1 to 0.
#[repr(C)]
pub struct ComObject<T: Object> {
    vtbl: *const VTableOf<T>,
    strong: AtomicU32,
    value: T,
}

impl<T: Object> ComObject<T>
where
    T::Interface: Bind<Self>,
{
    /// Move `value` into a new container and return the first strong reference.
    pub fn new(value: T) -> StrongRef<T::Interface> {
        let vtbl = VTableRegistry::global().get_or_build::<Self>();
        let boxed = Box::new(Self {
            vtbl,
            strong: AtomicU32::new(1),
            value,
        });
        log::trace!("created {} as {}", type_name::<T>(), <T::Interface as Interface>::NAME);
        let raw = NonNull::from(Box::leak(boxed));
        // SAFETY: the container starts with the vtable pointer and we hand
        // over the initial strong reference.
        unsafe { StrongRef::from_raw(raw.cast::<T::Interface>().as_ptr()) }
    }
}

impl<T: Object> ComObject<T> {
    /// The container behind an interface reference.
    ///
    /// # Safety
    /// `iface` must have been created by `ComObject::<T>::new`.
    pub unsafe fn from_ref(iface: &T::Interface) -> &Self {
        unsafe { &*Self::from_interface((iface as *const T::Interface).cast()) }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn strong_count(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }
}

unsafe impl<T: Object> Outer for ComObject<T> {
    type Value = T;

    #[inline]
    unsafe fn from_interface(this: *const c_void) -> *const Self {
        unsafe { this.byte_sub(offset_of!(Self, vtbl)).cast() }
    }

    #[inline]
    fn value(&self) -> &T {
        &self.value
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        checked_increment(self.strong.fetch_add(1, Ordering::Relaxed))
    }

    unsafe fn release(this: *const Self) -> u32 {
        let prev = unsafe { (*this).strong.fetch_sub(1, Ordering::Release) };
        if prev != 1 {
            return prev;
        }
        fence(Ordering::Acquire);
        log::trace!("destroying {}", type_name::<T>());
        // SAFETY: the last strong reference is gone and the box came from `new`.
        drop(unsafe { Box::from_raw(this.cast_mut()) });
        prev
    }
}

impl<T: Object> fmt::Debug for ComObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComObject")
            .field("value", &type_name::<T>())
            .field("strong", &self.strong_count())
            .finish()
    }
}

// ============================================================================
// WeakObject
// ============================================================================

/// Container tracking both strong and weak references.
///
/// All strong references together hold one weak reference. The value is
/// destroyed when the strong count reaches 0; the storage (and with it the
/// counts and vtable pointer) is freed when the weak count reaches 0.
#[repr(C)]
pub struct WeakObject<T: Object> {
    vtbl: *const VTableOf<T>,
    strong: AtomicU32,
    weak: AtomicU32,
    value: UnsafeCell<ManuallyDrop<T>>,
}

impl<T: Object> WeakObject<T>
where
    T::Interface: Interface<Counting = WeakTracked> + Bind<Self>,
{
    /// Move `value` into a new container and return the first strong reference.
    pub fn new(value: T) -> StrongRef<T::Interface> {
        let vtbl = VTableRegistry::global().get_or_build::<Self>();
        let boxed = Box::new(Self {
            vtbl,
            strong: AtomicU32::new(1),
            weak: AtomicU32::new(1),
            value: UnsafeCell::new(ManuallyDrop::new(value)),
        });
        log::trace!(
            "created {} as {} (weak)",
            type_name::<T>(),
            <T::Interface as Interface>::NAME
        );
        let raw = NonNull::from(Box::leak(boxed));
        // SAFETY: see ComObject::new.
        unsafe { StrongRef::from_raw(raw.cast::<T::Interface>().as_ptr()) }
    }

    /// Create the value and keep only a weak observer.
    ///
    /// The creator's strong reference is surrendered immediately, so the value
    /// is dropped before this returns and upgrading always fails.
    pub fn new_weak(value: T) -> WeakRef<T::Interface> {
        Self::new(value).downgrade()
    }
}

impl<T: Object> WeakObject<T> {
    /// The container behind an interface reference.
    ///
    /// # Safety
    /// `iface` must have been created by `WeakObject::<T>::new`.
    pub unsafe fn from_ref(iface: &T::Interface) -> &Self {
        unsafe { &*Self::from_interface((iface as *const T::Interface).cast()) }
    }

    pub fn strong_count(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    pub fn weak_count(&self) -> u32 {
        self.weak.load(Ordering::Acquire)
    }
}

unsafe impl<T: Object> Outer for WeakObject<T> {
    type Value = T;

    #[inline]
    unsafe fn from_interface(this: *const c_void) -> *const Self {
        unsafe { this.byte_sub(offset_of!(Self, vtbl)).cast() }
    }

    #[inline]
    fn value(&self) -> &T {
        // SAFETY: only reached through a strong reference, which keeps the value alive.
        unsafe { &*self.value.get() }
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        checked_increment(self.strong.fetch_add(1, Ordering::Relaxed))
    }

    unsafe fn release(this: *const Self) -> u32 {
        let prev = unsafe { (*this).strong.fetch_sub(1, Ordering::Release) };
        if prev != 1 {
            return prev;
        }
        fence(Ordering::Acquire);
        log::trace!("dropping value of {}", type_name::<T>());
        // SAFETY: strong hit 0 and can never rise again, so nobody else can
        // reach the value.
        unsafe {
            ManuallyDrop::drop(&mut *(*this).value.get());
            Self::release_weak(this);
        }
        prev
    }
}

unsafe impl<T: Object> WeakOuter for WeakObject<T> {
    #[inline]
    fn add_ref_weak(&self) -> u32 {
        checked_increment(self.weak.fetch_add(1, Ordering::Relaxed))
    }

    unsafe fn release_weak(this: *const Self) -> u32 {
        let prev = unsafe { (*this).weak.fetch_sub(1, Ordering::Release) };
        if prev != 1 {
            return prev;
        }
        fence(Ordering::Acquire);
        log::trace!("freeing storage of {}", type_name::<T>());
        // SAFETY: no strong or weak references remain; the value is already dropped.
        drop(unsafe { Box::from_raw(this.cast_mut()) });
        prev
    }

    fn try_upgrade(&self) -> bool {
        let mut cur = self.strong.load(Ordering::Relaxed);
        loop {
            if cur == 0 {
                return false;
            }
            checked_increment(cur);
            match self.strong.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    fn try_downgrade(&self) -> bool {
        let mut cur = self.weak.load(Ordering::Relaxed);
        loop {
            if cur == 0 {
                return false;
            }
            checked_increment(cur);
            match self.weak.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }
}

impl<T: Object> fmt::Debug for WeakObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("value", &type_name::<T>())
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}
