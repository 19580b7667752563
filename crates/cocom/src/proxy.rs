//! Binding implementation types to vtables.
//!
//! A container ([`Outer`]) owns a user value together with its reference
//! counts and a pointer to the vtable of the value's most-derived interface.
//! Each vtable slot is a monomorphic `extern "C"` thunk that recovers the
//! container from the interface pointer (this-adjustment via `offset_of!`)
//! and forwards to the value or to the container's counting logic.
//!
//! Vtables are built at most once per container type and live for the rest
//! of the process in the [`VTableRegistry`].

use std::any::{TypeId, type_name};
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::{OnceLock, PoisonError, RwLock};

use fxhash::FxHashMap;

use crate::interface::{IUnknown, IUnknownVTable, IWeak, IWeakVTable, Interface, VTableLayout};
use crate::{Guid, HResult};

/// A user type exposed through an interface. Normally implemented by `#[object]`.
pub trait Object: Send + Sync + Sized + 'static {
    /// Most-derived interface the value implements.
    type Interface: Interface;
}

/// Storage for an [`Object`] reachable through interface pointers.
///
/// # Safety
/// The container must be `#[repr(C)]` with the vtable pointer at the offset
/// used by `from_interface`, and the counts must follow the returned-previous
/// convention.
pub unsafe trait Outer: Sized + 'static {
    type Value: Object;

    /// Recover the container from an interface pointer into it.
    ///
    /// # Safety
    /// `this` must point at the vtable pointer of a live container of this type.
    unsafe fn from_interface(this: *const c_void) -> *const Self;

    /// The user value. Only called while a strong reference is held.
    fn value(&self) -> &Self::Value;

    /// Returns the previous strong count.
    fn add_ref(&self) -> u32;

    /// Returns the previous strong count. Destroys the value when it was 1.
    ///
    /// # Safety
    /// The caller must own a strong reference on `this`.
    unsafe fn release(this: *const Self) -> u32;
}

/// A container that also tracks weak references.
///
/// # Safety
/// Storage must stay valid while the weak count is non-zero, and the strong
/// references collectively hold one weak reference.
pub unsafe trait WeakOuter: Outer {
    fn add_ref_weak(&self) -> u32;

    /// # Safety
    /// The caller must own a weak reference on `this`.
    unsafe fn release_weak(this: *const Self) -> u32;

    fn try_upgrade(&self) -> bool;

    fn try_downgrade(&self) -> bool;
}

/// Builds the vtable of `Self` for container `O`.
///
/// Implemented for [`IUnknown`] with every container, for [`IWeak`] with
/// [`WeakOuter`] containers only, and by `#[interface]` for user interfaces
/// whose parent is bindable and whose implementation trait `O::Value` satisfies.
///
/// # Safety
/// Every slot of the returned table must be a thunk that treats its `this`
/// argument as an interface pointer into an `O`.
pub unsafe trait Bind<O: Outer>: Interface {
    fn build() -> Self::VTable;
}

/// Most-derived interface of the value held by container `O`.
pub type Top<O> = <<O as Outer>::Value as Object>::Interface;

type Table<O> = <Top<O> as VTableLayout>::VTable;

#[inline]
unsafe fn outer<'a, O: Outer>(this: *const IUnknown) -> &'a O {
    unsafe { &*O::from_interface(this.cast()) }
}

unsafe impl<O: Outer> Bind<O> for IUnknown {
    fn build() -> IUnknownVTable {
        IUnknownVTable {
            query_interface: unknown_query_interface::<O>,
            add_ref: unknown_add_ref::<O>,
            release: unknown_release::<O>,
        }
    }
}

unsafe extern "C" fn unknown_query_interface<O: Outer>(
    this: *const IUnknown,
    guid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    if out.is_null() {
        return HResult::INVALID_ARGUMENT;
    }
    unsafe {
        *out = ptr::null_mut();
        let this = NonNull::new(this.cast_mut().cast::<c_void>());
        let (Some(this), Some(guid)) = (this, guid.as_ref()) else {
            return HResult::INVALID_POINTER;
        };

        match <Top<O> as Interface>::query_chain(this, guid) {
            Ok(found) => {
                *out = found.as_ptr();
                HResult::OK
            }
            Err(hr) => {
                log::trace!(
                    "{} does not implement {guid} (queried on {})",
                    type_name::<O::Value>(),
                    <Top<O> as Interface>::NAME
                );
                hr
            }
        }
    }
}

unsafe extern "C" fn unknown_add_ref<O: Outer>(this: *const IUnknown) -> u32 {
    unsafe { outer::<O>(this).add_ref() }
}

unsafe extern "C" fn unknown_release<O: Outer>(this: *const IUnknown) -> u32 {
    unsafe { O::release(O::from_interface(this.cast())) }
}

unsafe impl<O: WeakOuter> Bind<O> for IWeak {
    fn build() -> IWeakVTable {
        IWeakVTable {
            base: <IUnknown as Bind<O>>::build(),
            add_ref_weak: weak_add_ref::<O>,
            release_weak: weak_release::<O>,
            try_upgrade: weak_try_upgrade::<O>,
            try_downgrade: weak_try_downgrade::<O>,
        }
    }
}

unsafe extern "C" fn weak_add_ref<O: WeakOuter>(this: *const IWeak) -> u32 {
    unsafe { outer::<O>(this.cast()).add_ref_weak() }
}

unsafe extern "C" fn weak_release<O: WeakOuter>(this: *const IWeak) -> u32 {
    unsafe { O::release_weak(O::from_interface(this.cast())) }
}

unsafe extern "C" fn weak_try_upgrade<O: WeakOuter>(this: *const IWeak) -> bool {
    unsafe { outer::<O>(this.cast()).try_upgrade() }
}

unsafe extern "C" fn weak_try_downgrade<O: WeakOuter>(this: *const IWeak) -> bool {
    unsafe { outer::<O>(this.cast()).try_downgrade() }
}

// ============================================================================
// Registry
// ============================================================================

/// Type-erased pointer to a leaked vtable.
#[derive(Clone, Copy)]
struct TableEntry(NonNull<()>);

// SAFETY: entries point at immutable leaked vtables, which are Send + Sync.
unsafe impl Send for TableEntry {}
unsafe impl Sync for TableEntry {}

/// Process-wide store of built vtables, one per container type.
///
/// Tables are leaked on first use and never freed, so the references handed
/// out are `'static` and the same address is returned for every instance of
/// a container type.
pub struct VTableRegistry {
    tables: RwLock<FxHashMap<TypeId, TableEntry>>,
}

static REGISTRY: OnceLock<VTableRegistry> = OnceLock::new();

impl VTableRegistry {
    fn new() -> Self {
        Self {
            tables: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(Self::new)
    }

    /// Vtable for container `O`, building it on first request.
    pub fn get_or_build<O>(&self) -> &'static Table<O>
    where
        O: Outer,
        Top<O>: Bind<O>,
    {
        let key = TypeId::of::<O>();
        let cached = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied();

        let entry = match cached {
            Some(entry) => entry,
            None => {
                let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
                *tables.entry(key).or_insert_with(|| {
                    log::debug!(
                        "building {} vtable ({} slots) for {}",
                        <Top<O> as Interface>::NAME,
                        <Top<O> as VTableLayout>::SLOT_COUNT,
                        type_name::<O>()
                    );
                    let table: &'static Table<O> =
                        Box::leak(Box::new(<Top<O> as Bind<O>>::build()));
                    TableEntry(NonNull::from(table).cast())
                })
            }
        };

        // SAFETY: the entry under TypeId::of::<O>() was built from O's binder.
        unsafe { entry.0.cast::<Table<O>>().as_ref() }
    }

    /// Whether a vtable for container `O` has been built.
    pub fn contains<O: 'static>(&self) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<O>())
    }

    /// Number of distinct vtables built so far.
    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
