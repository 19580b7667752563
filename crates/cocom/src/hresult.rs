//! 32-bit status codes returned across the binary interface.
//!
//! Layout: bit 31 is the severity (set means failure), bits 16..=30 the
//! facility and bits 0..=15 the code.

use std::fmt;
use std::io;

/// Facility used when wrapping a Win32 error code.
pub const FACILITY_WIN32: u16 = 7;

/// Signed 32-bit status code. Non-negative values are success.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HResult(pub i32);

impl HResult {
    pub const OK: Self = Self(0);
    pub const FALSE: Self = Self(1);
    pub const NOT_IMPLEMENTED: Self = Self::from_u32(0x8000_4001);
    pub const NO_INTERFACE: Self = Self::from_u32(0x8000_4002);
    pub const INVALID_POINTER: Self = Self::from_u32(0x8000_4003);
    pub const ABORTED: Self = Self::from_u32(0x8000_4004);
    pub const FAIL: Self = Self::from_u32(0x8000_4005);
    pub const UNEXPECTED: Self = Self::from_u32(0x8000_FFFF);
    pub const ACCESS_DENIED: Self = Self::from_u32(0x8007_0005);
    pub const INVALID_HANDLE: Self = Self::from_u32(0x8007_0006);
    pub const OUT_OF_MEMORY: Self = Self::from_u32(0x8007_000E);
    pub const INVALID_ARGUMENT: Self = Self::from_u32(0x8007_0057);

    #[inline]
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value as i32)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Build a code from its parts. The facility is truncated to 15 bits.
    #[must_use]
    pub const fn from_parts(failure: bool, facility: u16, code: u16) -> Self {
        let severity = if failure { 0x8000_0000 } else { 0 };
        Self::from_u32(severity | (((facility as u32) & 0x7FFF) << 16) | code as u32)
    }

    /// Wrap a Win32 error code. Zero and already-negative values pass through.
    #[must_use]
    pub const fn from_win32(error: u32) -> Self {
        if error as i32 <= 0 {
            Self(error as i32)
        } else {
            Self::from_parts(true, FACILITY_WIN32, (error & 0xFFFF) as u16)
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// 1 on failure, 0 on success.
    #[must_use]
    pub const fn severity(self) -> u32 {
        self.as_u32() >> 31
    }

    #[must_use]
    pub const fn facility(self) -> u16 {
        ((self.as_u32() >> 16) & 0x7FFF) as u16
    }

    #[must_use]
    pub const fn code(self) -> u16 {
        (self.as_u32() & 0xFFFF) as u16
    }

    /// `Ok(())` for any success code, `Err(self)` otherwise.
    #[inline]
    pub fn ok(self) -> Result<(), HResult> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    /// Symbolic name for the well-known codes.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::OK => "S_OK",
            Self::FALSE => "S_FALSE",
            Self::NOT_IMPLEMENTED => "E_NOTIMPL",
            Self::NO_INTERFACE => "E_NOINTERFACE",
            Self::INVALID_POINTER => "E_POINTER",
            Self::ABORTED => "E_ABORT",
            Self::FAIL => "E_FAIL",
            Self::UNEXPECTED => "E_UNEXPECTED",
            Self::ACCESS_DENIED => "E_ACCESSDENIED",
            Self::INVALID_HANDLE => "E_HANDLE",
            Self::OUT_OF_MEMORY => "E_OUTOFMEMORY",
            Self::INVALID_ARGUMENT => "E_INVALIDARG",
            _ => return None,
        })
    }
}

impl From<HResult> for bool {
    fn from(value: HResult) -> Self {
        value.is_success()
    }
}

impl From<HResult> for i32 {
    fn from(value: HResult) -> Self {
        value.0
    }
}

impl From<i32> for HResult {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<io::Error> for HResult {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::OutOfMemory => Self::OUT_OF_MEMORY,
            io::ErrorKind::PermissionDenied => Self::ACCESS_DENIED,
            io::ErrorKind::InvalidInput => Self::INVALID_ARGUMENT,
            io::ErrorKind::Unsupported => Self::NOT_IMPLEMENTED,
            _ => match err.raw_os_error() {
                #[cfg(windows)]
                Some(code) => Self::from_win32(code as u32),
                _ => Self::FAIL,
            },
        }
    }
}

impl From<HResult> for io::Error {
    fn from(value: HResult) -> Self {
        io::Error::other(value)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.as_u32()),
            None => write!(f, "0x{:08X}", self.as_u32()),
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({self})")
    }
}

impl std::error::Error for HResult {}

#[cfg(feature = "windows-compat")]
impl From<windows_core::HRESULT> for HResult {
    fn from(value: windows_core::HRESULT) -> Self {
        Self(value.0)
    }
}

#[cfg(feature = "windows-compat")]
impl From<HResult> for windows_core::HRESULT {
    fn from(value: HResult) -> Self {
        windows_core::HRESULT(value.0)
    }
}
