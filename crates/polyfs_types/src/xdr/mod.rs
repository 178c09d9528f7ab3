//! A small XDR (RFC 4506) codec.
//!
//! Values implement [`Pack`] and [`Unpack`]; both traits operate on plain
//! `std::io` streams and report the number of bytes transferred so callers
//! can validate record lengths. Most protocol structs derive the
//! implementations with [`XdrCodec`].

mod error;
mod list;
mod opaque;
mod primitives;
mod util;
mod void;

pub use polyfs_macros::XdrCodec;

pub use self::error::Error;
pub use self::list::{BoundedList, List};
pub use self::opaque::Opaque;
pub use self::util::{add_padding, get_padding, zero_padding};
pub use self::void::Void;

use std::io::{Read, Write};

pub type Result<T> = std::result::Result<T, Error>;

pub trait Pack {
    /// Number of bytes [`Self::pack`] will write.
    fn packed_size(&self) -> usize;

    /// Encodes the value, returning the number of bytes written.
    fn pack(&self, out: &mut impl Write) -> Result<usize>;
}

pub trait Unpack: Sized {
    /// Decodes a value, returning it and the number of bytes consumed.
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)>;
}

/// Packs a value into a fresh byte vector.
pub fn pack_to_vec(value: &impl Pack) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(value.packed_size());
    value.pack(&mut buf)?;
    Ok(buf)
}

/// Unpacks a value from a byte slice, requiring that the whole slice is
/// consumed.
pub fn unpack_from_slice<T: Unpack>(bytes: &[u8]) -> Result<T> {
    let mut cursor = std::io::Cursor::new(bytes);
    let (value, read) = T::unpack(&mut cursor)?;
    if read != bytes.len() {
        return Err(Error::InvalidLength(read));
    }
    Ok(value)
}
