//! 128-bit interface identifiers.
//!
//! A [`Guid`] is stored so that its in-memory byte sequence always equals the
//! canonical textual order (`00112233-4455-6677-8899-aabbccddeeff` is the bytes
//! `00 11 22 .. ff`). The three leading integer fields therefore hold their
//! values big-endian, which on little-endian hosts means byte-reversed. Two
//! hosts of different endianness agree on both equality and formatting.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::GuidParseError;

/// Positions of the four dashes in the canonical 36 character form.
const DASHES: [usize; 4] = [8, 13, 18, 23];

/// Length of the canonical textual form.
pub const GUID_TEXT_LEN: usize = 36;

/// 128-bit globally unique identifier naming an interface.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Guid {
    a: u32,
    b: u16,
    c: u16,
    d: [u8; 8],
}

impl Guid {
    /// The nil GUID.
    pub const NIL: Guid = Guid::from_bytes([0; 16]);

    /// Create a GUID from 16 bytes in canonical (textual) order.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self {
            a: u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            b: u16::from_ne_bytes([bytes[4], bytes[5]]),
            c: u16::from_ne_bytes([bytes[6], bytes[7]]),
            d: [
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ],
        }
    }

    /// Create a GUID from its canonical component values, as they read in
    /// `data1-data2-data3-data4`.
    #[must_use]
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        let a = data1.to_be_bytes();
        let b = data2.to_be_bytes();
        let c = data3.to_be_bytes();
        Self::from_bytes([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], data4[0], data4[1], data4[2],
            data4[3], data4[4], data4[5], data4[6], data4[7],
        ])
    }

    /// Create a GUID from a 128-bit integer whose hex digits read like the text form.
    ///
    /// `Guid::from_u128(0x00000000_0000_0000_c000_000000000046)` is IUnknown.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self::from_bytes(value.to_be_bytes())
    }

    /// Inverse of [`Guid::from_u128`].
    #[must_use]
    pub const fn to_u128(self) -> u128 {
        u128::from_be_bytes(self.as_bytes())
    }

    /// The 16 bytes in canonical order. Identical to the in-memory layout.
    #[must_use]
    pub const fn as_bytes(&self) -> [u8; 16] {
        let a = self.a.to_ne_bytes();
        let b = self.b.to_ne_bytes();
        let c = self.c.to_ne_bytes();
        let d = self.d;
        [
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d[0], d[1], d[2], d[3], d[4], d[5],
            d[6], d[7],
        ]
    }

    #[must_use]
    pub const fn data1(&self) -> u32 {
        u32::from_be(self.a)
    }

    #[must_use]
    pub const fn data2(&self) -> u16 {
        u16::from_be(self.b)
    }

    #[must_use]
    pub const fn data3(&self) -> u16 {
        u16::from_be(self.c)
    }

    #[must_use]
    pub const fn data4(&self) -> [u8; 8] {
        self.d
    }

    /// Parse the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    ///
    /// Hex digits are case-insensitive. Anything else (wrong length, a
    /// misplaced dash, a non-hex digit) is rejected; no partial value is ever
    /// produced.
    pub const fn parse(text: &str) -> Result<Self, GuidParseError> {
        let text = text.as_bytes();
        if text.len() != GUID_TEXT_LEN {
            return Err(GuidParseError::InvalidLength { found: text.len() });
        }

        let mut i = 0;
        while i < DASHES.len() {
            if text[DASHES[i]] != b'-' {
                return Err(GuidParseError::MissingDash {
                    position: DASHES[i],
                });
            }
            i += 1;
        }

        let mut bytes = [0u8; 16];
        let mut pos = 0;
        let mut out = 0;
        while pos < GUID_TEXT_LEN {
            if text[pos] == b'-' && is_dash_position(pos) {
                pos += 1;
                continue;
            }
            let hi = match hex_value(text[pos]) {
                Some(v) => v,
                None => {
                    return Err(GuidParseError::InvalidDigit {
                        position: pos,
                        found: text[pos],
                    });
                }
            };
            let lo = match hex_value(text[pos + 1]) {
                Some(v) => v,
                None => {
                    return Err(GuidParseError::InvalidDigit {
                        position: pos + 1,
                        found: text[pos + 1],
                    });
                }
            };
            bytes[out] = (hi << 4) | lo;
            out += 1;
            pos += 2;
        }

        Ok(Self::from_bytes(bytes))
    }

    /// Parse a GUID literal in a `const` context.
    ///
    /// # Panics
    /// Panics (at compile time when used in a `const` item) if `text` is malformed.
    #[must_use]
    pub const fn from_str_const(text: &str) -> Self {
        match Self::parse(text) {
            Ok(guid) => guid,
            Err(_) => panic!("malformed GUID literal"),
        }
    }

    /// 32-bit fold of the first field. Zero whenever that field is even, so
    /// `Hash` feeds the field itself instead.
    #[must_use]
    pub const fn hash32(&self) -> i32 {
        let a = self.a;
        (a ^ a.wrapping_add(1) ^ a.wrapping_add(2) ^ a.wrapping_add(3)) as i32
    }
}

const fn is_dash_position(pos: usize) -> bool {
    pos == DASHES[0] || pos == DASHES[1] || pos == DASHES[2] || pos == DASHES[3]
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::NIL
    }
}

/// Feeds the first field only; the rest of the GUID is left to `Eq`.
impl Hash for Guid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.a);
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u128> for Guid {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

impl From<Guid> for u128 {
    fn from(value: Guid) -> Self {
        value.to_u128()
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.d;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1(),
            self.data2(),
            self.data3(),
            d[0],
            d[1],
            d[2],
            d[3],
            d[4],
            d[5],
            d[6],
            d[7]
        )
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.d;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1(),
            self.data2(),
            self.data3(),
            d[0],
            d[1],
            d[2],
            d[3],
            d[4],
            d[5],
            d[6],
            d[7]
        )
    }
}

#[cfg(feature = "windows-compat")]
impl From<windows_core::GUID> for Guid {
    fn from(value: windows_core::GUID) -> Self {
        Self::from_fields(value.data1, value.data2, value.data3, value.data4)
    }
}

#[cfg(feature = "windows-compat")]
impl From<Guid> for windows_core::GUID {
    fn from(value: Guid) -> Self {
        windows_core::GUID::from_values(value.data1(), value.data2(), value.data3(), value.data4())
    }
}
