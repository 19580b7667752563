//! Walkthrough of the cocom object model
//!
//! Builds the `ITest3 : ITest2 : ITest1 : IUnknown` sample family on a
//! strong-only container, queries between its interfaces, then shows the
//! weak-reference lifecycle on `IFoo : IWeak`.
//!
//! Set `COCOM_LOG=debug` (or `trace`) to see vtable construction and
//! failed queries.

mod logger;
mod test1;

use cocom::{ComObject, HResult, IUnknown, IWeak, Interface, StrongRef, WeakObject};
use std::ffi::CStr;
use test1::{Enum1, Enum2, Foo, IFoo, ITest1, ITest2, ITest3, Struct1, Test};

extern "C" fn multiply(a: i32, b: i32) -> i32 {
    a * b
}

fn main() {
    if let Err(err) = logger::init() {
        eprintln!("logger unavailable: {err}");
    }

    println!("=== cocom object model ===\n");

    // =========================================================================
    // PART 1: Interface family on a strong-only object
    // =========================================================================
    println!("--- PART 1: ITest3 : ITest2 : ITest1 ---");

    let test = ComObject::new(Test::default());
    println!("  {:?}", test);
    println!("  IID_ITest3 = {}", ITest3::GUID);
    println!("  ITest3 slots = {}", <ITest3 as cocom::VTableLayout>::SLOT_COUNT);
    println!("  add(40, 2) = {}", test.add(40, 2));
    println!("  sub(40, 2) = {}", test.sub(40, 2));

    test.set_foo(21);
    test.set_foo3(3);
    test.some();
    println!("  get_foo() = {}, get_foo2() = {}", test.get_foo(), test.get_foo2());

    let s2 = test.some1(Struct1 { a: 10 }, Enum1::B, Enum2(Enum2::A.0 | Enum2::C.0));
    println!("  some1 -> Struct2 {{ a: {} }}", s2.a);
    println!("  fn_ptr(multiply) -> {}", test.fn_ptr(Some(multiply)));
    println!("  fn_ptr(null) -> {}", test.fn_ptr(None));

    // =========================================================================
    // PART 2: QueryInterface
    // =========================================================================
    println!("\n--- PART 2: QueryInterface ---");

    let unknown: StrongRef<IUnknown> = test.upcast_ref();
    match unknown.cast::<ITest1>() {
        Ok(t1) => println!("  IUnknown -> ITest1: ok, add(1, 1) = {}", t1.add(1, 1)),
        Err(hr) => println!("  IUnknown -> ITest1 failed: {hr}"),
    }
    match unknown.cast::<ITest2>() {
        Ok(t2) => println!("  IUnknown -> ITest2: ok, get_foo() = {}", t2.get_foo()),
        Err(hr) => println!("  IUnknown -> ITest2 failed: {hr}"),
    }
    let miss: Result<StrongRef<IWeak>, HResult> = unknown.cast();
    match miss {
        Ok(_) => println!("  IUnknown -> IWeak: unexpectedly ok"),
        Err(hr) => println!("  IUnknown -> IWeak: {hr}"),
    }
    drop(unknown);
    drop(test);

    // =========================================================================
    // PART 3: Weak references
    // =========================================================================
    println!("\n--- PART 3: IFoo : IWeak ---");

    let foo = WeakObject::new(Foo);
    let weak = foo.downgrade();
    let name = unsafe { CStr::from_ptr(foo.name().cast()) };
    println!("  created {:?} named {:?}", foo, name);
    println!("  IFoo counting = {}", std::any::type_name::<<IFoo as Interface>::Counting>());
    println!("  alive while strong held: {}", Foo::observe(&weak));

    drop(foo);
    println!("  alive after last strong dropped: {}", Foo::observe(&weak));
    println!("  weak still points at storage: {:?}", weak);

    println!("\n=== done ===");
}
