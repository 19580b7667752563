//! Sample interface family used by the demo.
//!
//! `ITest3 : ITest2 : ITest1 : IUnknown` is strong-only; `IFoo : IWeak` is
//! weak-tracked.

#![allow(dead_code)]

use cocom::proc::{interface, object};
use cocom::{HResult, IUnknown, IWeak, WeakRef};
use std::sync::atomic::{AtomicU32, Ordering};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enum1 {
    A = 0,
    B = 1,
    C = 2,
}

/// Bit flags.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enum2(pub i32);

impl Enum2 {
    pub const NONE: Self = Self(0);
    pub const A: Self = Self(1);
    pub const B: Self = Self(2);
    pub const C: Self = Self(4);
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Struct1 {
    pub a: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Struct2 {
    pub a: i32,
}

pub type BinaryFn = extern "C" fn(i32, i32) -> i32;

#[interface("c523bd17-e326-446c-8aab-c4e40774531a")]
pub trait ITest1: IUnknown {
    fn add(&self, a: u32, b: u32) -> u32;
}

#[interface("e6ea2c14-564f-47f8-9a62-7a55446c1438")]
pub trait ITest2: ITest1 {
    fn sub(&self, a: u32, b: u32) -> u32;
    fn get_foo(&self) -> u32;
    fn set_foo(&self, value: u32);
    fn get_foo2(&self) -> u32;
    fn set_foo3(&self, value: u32);
    fn some(&self);
}

#[interface("e785d2ba-cc37-48c6-b2fb-f253a21d0431")]
pub trait ITest3: ITest2 {
    fn some1(&self, a: Struct1, b: Enum1, c: Enum2) -> Struct2;
    fn fn_ptr(&self, f: Option<BinaryFn>) -> HResult;
}

#[interface("3b8f6e0a-52c1-4d7e-9a44-6f1e2d3c4b5a")]
pub trait IFoo: IWeak {
    fn name(&self) -> *const u8;
}

// =============================================================================
// Implementations
// =============================================================================

#[object(ITest3)]
#[derive(Default)]
pub struct Test {
    foo: AtomicU32,
    foo3: AtomicU32,
    calls: AtomicU32,
}

impl ITest1Impl for Test {
    fn add(&self, a: u32, b: u32) -> u32 {
        a.wrapping_add(b)
    }
}

impl ITest2Impl for Test {
    fn sub(&self, a: u32, b: u32) -> u32 {
        a.wrapping_sub(b)
    }

    fn get_foo(&self) -> u32 {
        self.foo.load(Ordering::Relaxed)
    }

    fn set_foo(&self, value: u32) {
        self.foo.store(value, Ordering::Relaxed);
    }

    fn get_foo2(&self) -> u32 {
        self.foo.load(Ordering::Relaxed) * 2
    }

    fn set_foo3(&self, value: u32) {
        self.foo3.store(value, Ordering::Relaxed);
    }

    fn some(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl ITest3Impl for Test {
    fn some1(&self, a: Struct1, b: Enum1, c: Enum2) -> Struct2 {
        Struct2 {
            a: a.a + b as i32 + c.0,
        }
    }

    fn fn_ptr(&self, f: Option<BinaryFn>) -> HResult {
        match f {
            Some(f) => {
                log::info!("callback returned {}", f(6, 7));
                HResult::OK
            }
            None => HResult::INVALID_POINTER,
        }
    }
}

#[object(IFoo)]
pub struct Foo;

impl IFooImpl for Foo {
    fn name(&self) -> *const u8 {
        c"foo".as_ptr().cast()
    }
}

impl Foo {
    /// Upgrade `weak` and report whether the object was still alive.
    pub fn observe(weak: &WeakRef<IFoo>) -> bool {
        let strong = weak.upgrade();
        match strong.get() {
            Some(foo) => {
                log::debug!("upgraded weak reference to IFoo at {:p}", foo);
                true
            }
            None => false,
        }
    }
}
