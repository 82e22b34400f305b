//! Minimal packing/unpacking shims used by [`crate::Tube`]'s send/recv
//! surface: `p8/p16/p32/p64`, `pack`, `flat`, `fit`, `u8/u16/u32/u64`,
//! `unpack`.
//!
//! General-purpose struct-packing is an external collaborator's job, not
//! this crate's, but these specific fixed-width shims are in-scope
//! operations of the send/receive surface, so they're implemented
//! directly here rather than left unimplemented. There is no third-party
//! "packing collaborator" crate in the corpus this crate depends on for
//! anything beyond these few integer-width conversions, so they're plain
//! functions over `to_le_bytes`/`to_be_bytes`, not a dependency.

use crate::context::Endian;
use crate::error::{Error, Result};

pub fn p8(v: u8) -> Vec<u8> {
    vec![v]
}

pub fn p16(v: u16, endian: Endian) -> Vec<u8> {
    match endian {
        Endian::Little => v.to_le_bytes().to_vec(),
        Endian::Big => v.to_be_bytes().to_vec(),
    }
}

pub fn p32(v: u32, endian: Endian) -> Vec<u8> {
    match endian {
        Endian::Little => v.to_le_bytes().to_vec(),
        Endian::Big => v.to_be_bytes().to_vec(),
    }
}

pub fn p64(v: u64, endian: Endian) -> Vec<u8> {
    match endian {
        Endian::Little => v.to_le_bytes().to_vec(),
        Endian::Big => v.to_be_bytes().to_vec(),
    }
}

pub fn u8(bytes: &[u8]) -> Result<u8> {
    bytes
        .first()
        .copied()
        .ok_or_else(|| Error::bad_argument("u8: empty input"))
}

pub fn u16(bytes: &[u8], endian: Endian) -> Result<u16> {
    let arr: [u8; 2] = bytes
        .try_into()
        .map_err(|_| Error::bad_argument(format!("u16: expected 2 bytes, got {}", bytes.len())))?;
    Ok(match endian {
        Endian::Little => u16::from_le_bytes(arr),
        Endian::Big => u16::from_be_bytes(arr),
    })
}

pub fn u32(bytes: &[u8], endian: Endian) -> Result<u32> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::bad_argument(format!("u32: expected 4 bytes, got {}", bytes.len())))?;
    Ok(match endian {
        Endian::Little => u32::from_le_bytes(arr),
        Endian::Big => u32::from_be_bytes(arr),
    })
}

pub fn u64(bytes: &[u8], endian: Endian) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::bad_argument(format!("u64: expected 8 bytes, got {}", bytes.len())))?;
    Ok(match endian {
        Endian::Little => u64::from_le_bytes(arr),
        Endian::Big => u64::from_be_bytes(arr),
    })
}

/// Packs `value` into exactly `bits / 8` bytes. `bits` must be one of 8,
/// 16, 32, 64.
pub fn pack(value: u64, bits: u32, endian: Endian) -> Result<Vec<u8>> {
    match bits {
        8 => Ok(p8(value as u8)),
        16 => Ok(p16(value as u16, endian)),
        32 => Ok(p32(value as u32, endian)),
        64 => Ok(p64(value, endian)),
        other => Err(Error::bad_argument(format!(
            "pack: unsupported width {other} bits, expected 8, 16, 32 or 64"
        ))),
    }
}

/// An item flattenable by [`flat`]: either raw bytes, or an integer packed
/// at the tube's configured pointer width (64 bits) and endianness.
pub enum FlatItem {
    Bytes(Vec<u8>),
    Int(u64),
}

impl From<Vec<u8>> for FlatItem {
    fn from(v: Vec<u8>) -> Self {
        FlatItem::Bytes(v)
    }
}

impl From<&[u8]> for FlatItem {
    fn from(v: &[u8]) -> Self {
        FlatItem::Bytes(v.to_vec())
    }
}

impl From<u64> for FlatItem {
    fn from(v: u64) -> Self {
        FlatItem::Int(v)
    }
}

/// Concatenates a heterogeneous sequence of byte strings and integers
/// (packed at 64 bits) into one buffer, in order.
pub fn flat(items: impl IntoIterator<Item = FlatItem>, endian: Endian) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        match item {
            FlatItem::Bytes(b) => out.extend_from_slice(&b),
            FlatItem::Int(v) => out.extend_from_slice(&p64(v, endian)),
        }
    }
    out
}

/// Builds a buffer laid out by explicit byte offset, zero-filling any gap
/// between pieces. Pieces may be given in any order and must not overlap.
pub fn fit(pieces: impl IntoIterator<Item = (usize, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut pieces: Vec<(usize, Vec<u8>)> = pieces.into_iter().collect();
    pieces.sort_by_key(|(offset, _)| *offset);

    let mut out = Vec::new();
    let mut cursor = 0usize;
    for (offset, data) in pieces {
        if offset < cursor {
            return Err(Error::bad_argument(format!(
                "fit: piece at offset {offset} overlaps previous piece ending at {cursor}"
            )));
        }
        out.resize(offset, 0u8);
        out.extend_from_slice(&data);
        cursor = offset + data.len();
    }
    Ok(out)
}
