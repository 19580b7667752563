//! Tests for #[interface] layout and capability negotiation

use cocom::proc::{interface, object};
use cocom::{
    ComObject, Guid, HResult, IID_IUNKNOWN, IUnknown, IUnknownVTable, Inherits, Interface,
    StrongOnly, StrongRef, VTableLayout,
};
use std::ffi::c_void;
use std::mem::{offset_of, size_of};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Interfaces
// =============================================================================

#[interface("c523bd17-e326-446c-8aab-c4e40774531a")]
pub trait ITest1: IUnknown {
    fn add(&self, a: u32, b: u32) -> u32;
}

#[interface("e6ea2c14-564f-47f8-9a62-7a55446c1438")]
pub trait ITest2: ITest1 {
    fn sub(&self, a: u32, b: u32) -> u32;
    fn get_foo(&self) -> u32;
    fn set_foo(&self, value: u32);
}

#[interface("e785d2ba-cc37-48c6-b2fb-f253a21d0431")]
pub trait ITest3: ITest2 {
    fn some1(&self, value: i32) -> HResult;
}

/// Unrelated to the Test family.
#[interface("0b1d4a5e-7f0c-4a5d-9c8b-1e2f3a4b5c6d")]
pub trait IOther: IUnknown {
    fn other(&self) -> i32;
}

#[interface("5f0c2b1e-3a4d-4e6f-8a9b-0c1d2e3f4a5b")]
pub trait ISparse: IUnknown {
    fn first(&self) -> i32;
    #[slot(3)]
    fn fourth(&self) -> i32;
}

// =============================================================================
// Implementation
// =============================================================================

#[object(ITest3)]
struct Test3 {
    foo: AtomicU32,
}

impl ITest1Impl for Test3 {
    fn add(&self, a: u32, b: u32) -> u32 {
        a + b
    }
}

impl ITest2Impl for Test3 {
    fn sub(&self, a: u32, b: u32) -> u32 {
        a - b
    }

    fn get_foo(&self) -> u32 {
        self.foo.load(Ordering::Relaxed)
    }

    fn set_foo(&self, value: u32) {
        self.foo.store(value, Ordering::Relaxed);
    }
}

impl ITest3Impl for Test3 {
    fn some1(&self, value: i32) -> HResult {
        if value >= 0 { HResult::OK } else { HResult::INVALID_ARGUMENT }
    }
}

fn new_test3() -> StrongRef<ITest3> {
    ComObject::new(Test3 {
        foo: AtomicU32::new(0),
    })
}

#[object(ISparse)]
struct Sparse;

impl ISparseImpl for Sparse {
    fn first(&self) -> i32 {
        1
    }

    fn fourth(&self) -> i32 {
        4
    }
}

// =============================================================================
// Test: Layout
// =============================================================================

#[test]
fn test_iids() {
    assert_eq!(ITest1::GUID, IID_ITEST1);
    assert_eq!(IID_ITEST1.to_string(), "c523bd17-e326-446c-8aab-c4e40774531a");
    assert_eq!(IID_ITEST2.data1(), 0xe6ea2c14);
    assert_eq!(ITest3::NAME, "ITest3");
}

#[test]
fn test_slot_counts() {
    assert_eq!(<ITest1 as VTableLayout>::SLOT_COUNT, 4);
    assert_eq!(<ITest2 as VTableLayout>::SLOT_COUNT, 7);
    assert_eq!(<ITest3 as VTableLayout>::SLOT_COUNT, 8);
    // two reserved slots between `first` and `fourth`
    assert_eq!(<ISparse as VTableLayout>::SLOT_COUNT, 7);
}

#[test]
fn test_vtable_embeds_parent() {
    let ptr_size = size_of::<*const c_void>();
    assert_eq!(offset_of!(ITest1VTable, base), 0);
    assert_eq!(offset_of!(ITest2VTable, base), 0);
    assert_eq!(offset_of!(ITest3VTable, base), 0);
    assert_eq!(size_of::<IUnknownVTable>(), 3 * ptr_size);
    assert_eq!(offset_of!(ITest1VTable, add), 3 * ptr_size);
    assert_eq!(offset_of!(ITest2VTable, sub), 4 * ptr_size);
    assert_eq!(offset_of!(ITest2VTable, set_foo), 6 * ptr_size);
    assert_eq!(offset_of!(ITest3VTable, some1), 7 * ptr_size);
    assert_eq!(offset_of!(ISparseVTable, fourth), 6 * ptr_size);
}

#[test]
fn test_views_are_one_pointer() {
    assert_eq!(size_of::<ITest3>(), size_of::<*const c_void>());
}

#[test]
fn test_counting_is_inherited() {
    fn strong_only<T: Interface<Counting = StrongOnly>>() {}
    strong_only::<ITest1>();
    strong_only::<ITest3>();
}

#[test]
fn test_ancestry_is_transitive() {
    fn inherits<T: Inherits<U, I>, U: Interface, I>() {}
    inherits::<ITest3, ITest3, _>();
    inherits::<ITest3, ITest2, _>();
    inherits::<ITest3, ITest1, _>();
    inherits::<ITest3, IUnknown, _>();
    inherits::<ITest2, IUnknown, _>();
}

// =============================================================================
// Test: Dispatch
// =============================================================================

#[test]
fn test_methods_dispatch_through_vtable() {
    let obj = new_test3();
    assert_eq!(obj.add(2, 3), 5);
    assert_eq!(obj.sub(9, 4), 5);
    obj.set_foo(42);
    assert_eq!(obj.get_foo(), 42);
    assert_eq!(obj.some1(1), HResult::OK);
    assert_eq!(obj.some1(-1), HResult::INVALID_ARGUMENT);
}

#[test]
fn test_raw_slot_call() {
    let obj = new_test3();
    let view: &ITest3 = &obj;
    let add = view.vtable().base.base.add;
    let raw = view as *const ITest3 as *const ITest1;
    assert_eq!(unsafe { add(raw, 20, 22) }, 42);
}

#[test]
fn test_explicit_slots() {
    let obj = ComObject::new(Sparse);
    assert_eq!(obj.first(), 1);
    assert_eq!(obj.fourth(), 4);
}

// =============================================================================
// Test: QueryInterface
// =============================================================================

fn query(unknown: &IUnknown, guid: &Guid) -> (HResult, *mut c_void) {
    let mut out = ptr::null_mut();
    let hr = unknown.query_interface(guid, &mut out);
    (hr, out)
}

#[test]
fn test_query_walks_the_chain() {
    let obj = new_test3();
    let addr = obj.as_ptr().cast::<c_void>();
    for guid in [IID_ITEST3, IID_ITEST2, IID_ITEST1, IID_IUNKNOWN] {
        let (hr, out) = query(obj.as_unknown(), &guid);
        assert_eq!(hr, HResult::OK, "query for {guid}");
        assert_eq!(out, addr);
    }
}

#[test]
fn test_query_unrelated_fails_with_null_out() {
    let obj = new_test3();
    let mut out = 0x1usize as *mut c_void;
    let hr = obj.query_interface(&IID_IOTHER, &mut out);
    assert_eq!(hr, HResult::NO_INTERFACE);
    assert!(out.is_null());
}

#[test]
fn test_query_does_not_touch_counts() {
    let obj = new_test3();
    let before = unsafe { ComObject::<Test3>::from_ref(&obj) }.strong_count();
    let (hr, _) = query(obj.as_unknown(), &IID_ITEST1);
    assert_eq!(hr, HResult::OK);
    let after = unsafe { ComObject::<Test3>::from_ref(&obj) }.strong_count();
    assert_eq!(before, after);
}

#[test]
fn test_query_argument_validation() {
    let obj = new_test3();
    let qi = obj.as_unknown().vtable().query_interface;
    let this = obj.as_unknown() as *const IUnknown;

    let hr = unsafe { qi(this, &IID_ITEST1, ptr::null_mut()) };
    assert_eq!(hr, HResult::INVALID_ARGUMENT);

    let mut out = ptr::null_mut();
    let hr = unsafe { qi(this, ptr::null(), &mut out) };
    assert_eq!(hr, HResult::INVALID_POINTER);
    assert!(out.is_null());
}

#[test]
fn test_typed_query() {
    let obj = new_test3();
    let found = obj.as_unknown().query::<ITest1>().unwrap();
    assert_eq!(unsafe { found.as_ref() }.add(1, 1), 2);
    assert_eq!(
        obj.as_unknown().query::<IOther>().unwrap_err(),
        HResult::NO_INTERFACE
    );
}

#[test]
fn test_typed_query_result_is_borrowed() {
    let obj = new_test3();
    let outer = unsafe { ComObject::<Test3>::from_ref(&obj) };
    assert_eq!(outer.strong_count(), 1);

    let found = obj.as_unknown().query::<ITest1>().unwrap();
    assert_eq!(outer.strong_count(), 1);

    let owned = unsafe { StrongRef::clone_from_raw(found.as_ptr()) };
    assert_eq!(outer.strong_count(), 2);
    drop(owned);
    assert_eq!(outer.strong_count(), 1);
}
