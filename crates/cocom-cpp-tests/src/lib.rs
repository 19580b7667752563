//! C++ interop tests for cocom
//!
//! Verifies that cocom interface views line up with the vtables a C++
//! compiler emits for the same abstract classes, in both directions:
//! Rust adopting a C++ object and C++ driving a Rust [`ComObject`].
//! Slots are `extern "C"` with `this` first, which matches C++ member calls
//! on 64-bit targets.
//!
//! Run with: `cargo test -p cocom-cpp-tests`

#![recursion_limit = "512"]

use cocom::proc::{interface, object};
use cocom::IUnknown;
use cpp::cpp;
use std::sync::atomic::{AtomicI32, Ordering};

#[cfg(test)]
use cocom::{ComObject, Guid, HResult, IWeak, Interface, StrongRef};
#[cfg(test)]
use std::ffi::c_void;

// =============================================================================
// C++ side
// =============================================================================

cpp! {{
    #include <atomic>
    #include <cstdint>
    #include <cstring>

    struct CGuid {
        uint32_t a;
        uint16_t b;
        uint16_t c;
        uint8_t d[8];
    };

    static bool same_guid(const CGuid* x, const CGuid* y) {
        return std::memcmp(x, y, sizeof(CGuid)) == 0;
    }

    static const int32_t C_OK = 0;
    static const int32_t C_NOINTERFACE = (int32_t)0x80004002u;
    static const int32_t C_POINTER = (int32_t)0x80004003u;
    static const int32_t C_INVALIDARG = (int32_t)0x80070057u;

    class IUnknownLike {
    public:
        virtual int32_t QueryInterface(const CGuid* iid, void** out) = 0;
        virtual uint32_t AddRef() = 0;
        virtual uint32_t Release() = 0;
    };

    class ICounterLike : public IUnknownLike {
    public:
        virtual int32_t value() = 0;
        virtual int32_t increment() = 0;
    };

    // Counts follow the same contract as cocom: AddRef/Release return the
    // previous count and QueryInterface never touches it.
    class CppCounter : public ICounterLike {
        std::atomic<uint32_t> refs;
        int32_t current;
        CGuid unknown_iid;
        CGuid counter_iid;
        int32_t* destroyed;

    public:
        CppCounter(const CGuid* unknown, const CGuid* counter, int32_t start, int32_t* flag)
            : refs(1), current(start), destroyed(flag) {
            std::memcpy(&unknown_iid, unknown, sizeof(CGuid));
            std::memcpy(&counter_iid, counter, sizeof(CGuid));
        }

        virtual ~CppCounter() {
            if (destroyed) {
                *destroyed += 1;
            }
        }

        int32_t QueryInterface(const CGuid* iid, void** out) override {
            if (!out) {
                return C_INVALIDARG;
            }
            *out = nullptr;
            if (!iid) {
                return C_POINTER;
            }
            if (same_guid(iid, &unknown_iid) || same_guid(iid, &counter_iid)) {
                *out = static_cast<ICounterLike*>(this);
                return C_OK;
            }
            return C_NOINTERFACE;
        }

        uint32_t AddRef() override {
            return refs.fetch_add(1);
        }

        uint32_t Release() override {
            uint32_t prev = refs.fetch_sub(1);
            if (prev == 1) {
                delete this;
            }
            return prev;
        }

        int32_t value() override {
            return current;
        }

        int32_t increment() override {
            return ++current;
        }
    };
}}

// =============================================================================
// C++ helper functions (only used in tests)
// =============================================================================

#[cfg(test)]
fn create_cpp_counter(start: i32, destroyed: *mut i32) -> *mut ICounter {
    let unknown = &IUnknown::GUID as *const Guid;
    let counter = &ICounter::GUID as *const Guid;
    cpp!(unsafe [unknown as "const CGuid*", counter as "const CGuid*", start as "int32_t", destroyed as "int32_t*"] -> *mut ICounter as "void*" {
        return static_cast<ICounterLike*>(new CppCounter(unknown, counter, start, destroyed));
    })
}

/// Query `obj` from C++ for `iid`, call `increment` through the result and
/// release it again. Returns the new value, or the failing status.
#[cfg(test)]
fn cpp_query_and_increment(obj: *mut c_void, iid: &Guid) -> Result<i32, HResult> {
    let iid = iid as *const Guid;
    let mut value = 0i32;
    let out = &mut value as *mut i32;
    let status = cpp!(unsafe [obj as "IUnknownLike*", iid as "const CGuid*", out as "int32_t*"] -> i32 as "int32_t" {
        void* found = nullptr;
        int32_t hr = obj->QueryInterface(iid, &found);
        if (hr != C_OK) {
            return found == nullptr ? hr : (int32_t)0x8000FFFFu;
        }
        ICounterLike* counter = static_cast<ICounterLike*>(found);
        counter->AddRef();
        *out = counter->increment();
        counter->Release();
        return C_OK;
    });
    HResult(status).ok().map(|()| value)
}

#[cfg(test)]
fn cpp_add_ref(obj: *mut c_void) -> u32 {
    cpp!(unsafe [obj as "IUnknownLike*"] -> u32 as "uint32_t" {
        return obj->AddRef();
    })
}

#[cfg(test)]
fn cpp_release(obj: *mut c_void) -> u32 {
    cpp!(unsafe [obj as "IUnknownLike*"] -> u32 as "uint32_t" {
        return obj->Release();
    })
}

#[cfg(test)]
fn cpp_query_null_out(obj: *mut c_void) -> i32 {
    cpp!(unsafe [obj as "IUnknownLike*"] -> i32 as "int32_t" {
        CGuid zero = {};
        return obj->QueryInterface(&zero, nullptr);
    })
}

// =============================================================================
// Rust interface matching ICounterLike
// =============================================================================

#[interface("5d1c9a3e-7b42-4f08-9e6d-2a1b3c4d5e6f")]
pub trait ICounter: IUnknown {
    fn value(&self) -> i32;
    fn increment(&self) -> i32;
}

#[object(ICounter)]
pub struct Counter(AtomicI32);

impl Counter {
    pub fn new(start: i32) -> Self {
        Self(AtomicI32::new(start))
    }
}

impl ICounterImpl for Counter {
    fn value(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) -> i32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Rust adopts a C++ object and calls through its vtable
    #[test]
    fn test_rust_calls_cpp_object() {
        let mut destroyed = 0i32;
        {
            let counter = unsafe { StrongRef::from_raw(create_cpp_counter(4, &mut destroyed)) };
            assert_eq!(counter.value(), 4);
            assert_eq!(counter.increment(), 5);

            let unknown = counter.cast::<IUnknown>().unwrap();
            assert_eq!(unknown.as_ptr() as usize, counter.as_ptr() as usize);
            assert_eq!(counter.cast::<IWeak>().unwrap_err(), HResult::NO_INTERFACE);
            assert_eq!(destroyed, 0);
        }
        assert_eq!(destroyed, 1);
    }

    /// C++ queries a Rust object and calls through the returned vtable
    #[test]
    fn test_cpp_calls_rust_object() {
        let obj = ComObject::new(Counter::new(10));
        let raw = obj.as_ptr().cast::<c_void>();

        assert_eq!(cpp_query_and_increment(raw, &ICounter::GUID), Ok(11));
        assert_eq!(cpp_query_and_increment(raw, &IUnknown::GUID), Ok(12));
        assert_eq!(obj.value(), 12);
        assert_eq!(
            cpp_query_and_increment(raw, &IWeak::GUID),
            Err(HResult::NO_INTERFACE)
        );
    }

    /// C++ AddRef/Release on a Rust object observe the previous count
    #[test]
    fn test_cpp_counts_rust_object() {
        let obj = ComObject::new(Counter::new(0));
        let raw = obj.as_ptr().cast::<c_void>();
        assert_eq!(cpp_add_ref(raw), 1);
        assert_eq!(cpp_release(raw), 2);
        assert_eq!(cpp_query_null_out(raw), HResult::INVALID_ARGUMENT.0);
    }

    /// Same round trip, this time Rust calling C++ through raw slots
    #[test]
    fn test_raw_slots_on_cpp_object() {
        let mut destroyed = 0i32;
        let raw = create_cpp_counter(1, &mut destroyed);
        let unknown = unsafe { &*raw.cast::<IUnknown>() };

        let mut out: *mut c_void = std::ptr::null_mut();
        let unknown_guid = Guid::from_u128(0x9999_9999_9999_4999_8999_999999999999);
        assert_eq!(
            unknown.query_interface(&unknown_guid, &mut out),
            HResult::NO_INTERFACE
        );
        assert!(out.is_null());

        assert_eq!(unknown.add_ref(), 1);
        assert_eq!(unsafe { unknown.release() }, 2);
        assert_eq!(unsafe { unknown.release() }, 1);
        assert_eq!(destroyed, 1);
    }

    #[test]
    fn test_vtable_size() {
        let ptr_size = std::mem::size_of::<*const ()>();
        assert_eq!(std::mem::size_of::<ICounterVTable>(), 5 * ptr_size);
    }

    #[test]
    fn test_guid_layout_matches_c() {
        assert_eq!(std::mem::size_of::<Guid>(), 16);
        assert_eq!(std::mem::align_of::<Guid>(), 4);
    }
}
