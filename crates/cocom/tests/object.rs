//! Tests for ComObject / WeakObject lifetimes

use cocom::proc::{interface, object};
use cocom::{ComObject, IUnknown, IWeak, Interface, StrongRef, VTableRegistry, WeakObject};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[interface("2a7d6c1b-0e9f-4b8a-a1c2-d3e4f5061728")]
pub trait ICounter: IUnknown {
    fn value(&self) -> u32;
}

#[interface("8e1f2a3b-4c5d-4e6f-8091-a2b3c4d5e6f7")]
pub trait IFoo: IWeak {
    fn bar(&self) -> i32;
}

/// Counts how many times its value was dropped.
struct DropProbe(Arc<AtomicUsize>);

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[object(ICounter)]
struct Counter {
    value: u32,
    _probe: DropProbe,
}

impl ICounterImpl for Counter {
    fn value(&self) -> u32 {
        self.value
    }
}

#[object(IFoo)]
struct Foo {
    _probe: DropProbe,
}

impl IFooImpl for Foo {
    fn bar(&self) -> i32 {
        7
    }
}

fn counter(drops: &Arc<AtomicUsize>) -> StrongRef<ICounter> {
    ComObject::new(Counter {
        value: 11,
        _probe: DropProbe(drops.clone()),
    })
}

fn foo(drops: &Arc<AtomicUsize>) -> StrongRef<IFoo> {
    WeakObject::new(Foo {
        _probe: DropProbe(drops.clone()),
    })
}

// =============================================================================
// Test: ComObject
// =============================================================================

#[test]
fn test_new_object_has_one_strong() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = counter(&drops);
    let outer = unsafe { ComObject::<Counter>::from_ref(&obj) };
    assert_eq!(outer.strong_count(), 1);
    assert_eq!(outer.get().value, 11);
    assert_eq!(obj.value(), 11);
}

#[test]
fn test_add_ref_release_return_previous() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = counter(&drops);
    assert_eq!(obj.add_ref(), 1);
    assert_eq!(obj.add_ref(), 2);
    assert_eq!(unsafe { obj.release() }, 3);
    assert_eq!(unsafe { obj.release() }, 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
}

#[test]
fn test_n_add_ref_n_plus_one_release_destroys_once() {
    const N: u32 = 16;
    let drops = Arc::new(AtomicUsize::new(0));
    let raw = counter(&drops).into_raw();
    let unknown = unsafe { &*raw.cast::<IUnknown>() };

    for _ in 0..N {
        unknown.add_ref();
    }
    for i in 0..N {
        assert_eq!(unsafe { unknown.release() }, N + 1 - i);
        assert_eq!(drops.load(Ordering::SeqCst), 0, "destroyed early at release {i}");
    }
    let release = unknown.vtable().release;
    assert_eq!(unsafe { release(raw.cast()) }, 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_vtable_shared_between_instances() {
    let drops = Arc::new(AtomicUsize::new(0));
    let a = counter(&drops);
    let b = counter(&drops);
    assert!(std::ptr::eq(a.vtable(), b.vtable()));
    assert!(VTableRegistry::global().contains::<ComObject<Counter>>());
    assert!(!VTableRegistry::global().is_empty());
}

// =============================================================================
// Test: WeakObject
// =============================================================================

#[test]
fn test_weak_object_initial_counts() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = foo(&drops);
    let outer = unsafe { WeakObject::<Foo>::from_ref(&obj) };
    assert_eq!(outer.strong_count(), 1);
    assert_eq!(outer.weak_count(), 1);
    assert_eq!(obj.bar(), 7);
}

#[test]
fn test_weak_outlives_value() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = foo(&drops);
    let weak = obj.downgrade();
    {
        let outer = unsafe { WeakObject::<Foo>::from_ref(&obj) };
        assert_eq!(outer.weak_count(), 2);
    }

    drop(obj);
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    // storage is still alive: upgrading is answered, and fails
    assert!(weak.upgrade().is_null());
    assert!(weak.upgrade().is_null());
    drop(weak);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_upgrade_while_alive() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = foo(&drops);
    let weak = obj.downgrade();
    let again = weak.upgrade();
    assert!(!again.is_null());
    assert_eq!(again, obj);
    assert_eq!(again.bar(), 7);

    drop(obj);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(again);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_raw_weak_slots() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = foo(&drops);
    let weak: &IWeak = &obj;
    assert_eq!(weak.add_ref_weak(), 1);
    assert!(weak.try_upgrade());
    assert!(weak.try_downgrade());
    assert_eq!(unsafe { weak.release() }, 2);
    assert_eq!(unsafe { weak.release_weak() }, 3);
    assert_eq!(unsafe { weak.release_weak() }, 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
}

#[test]
fn test_new_weak_is_already_expired() {
    let drops = Arc::new(AtomicUsize::new(0));
    let weak = WeakObject::new_weak(Foo {
        _probe: DropProbe(drops.clone()),
    });
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(!weak.is_null());
    assert!(weak.upgrade().is_null());
}
