//! The archive buffer and the [`Archivable`] trait.

use crate::error::{ArchiveError, Result};

/// A growable byte buffer with sequential typed writes and cursor reads.
///
/// Writes always append at the high-watermark; reads advance an independent
/// cursor and fail (instead of panicking) when they would pass the watermark.
#[derive(Debug, Default, Clone)]
pub struct BinaryArchive {
    buf: Vec<u8>,
    cursor: usize,
}

macro_rules! primitive_accessors {
    ($($put:ident, $get:ident, $ty:ty;)*) => {
        $(
            #[doc = concat!("Appends one `", stringify!($ty), "` in native byte order.")]
            pub fn $put(&mut self, x: $ty) {
                self.buf.extend_from_slice(&x.to_ne_bytes());
            }

            #[doc = concat!("Reads one `", stringify!($ty), "` at the cursor.")]
            pub fn $get(&mut self) -> Result<$ty> {
                const N: usize = std::mem::size_of::<$ty>();
                let bytes = self.take(N)?;
                let mut raw = [0u8; N];
                raw.copy_from_slice(bytes);
                Ok(<$ty>::from_ne_bytes(raw))
            }
        )*
    };
}

impl BinaryArchive {
    /// Creates an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty archive with at least `cap` bytes reserved.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cursor: 0,
        }
    }

    /// Wraps an existing byte buffer for reading; the cursor starts at zero.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            buf: data,
            cursor: 0,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left between the cursor and the write high-watermark.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// Drops all contents and rewinds the cursor.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.cursor = 0;
    }

    /// Reserves room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the archive, releasing the underlying buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let remaining = self.buf.len() - self.cursor;
        if n > remaining {
            return Err(ArchiveError::ReadPastEnd {
                requested: n,
                remaining,
            });
        }
        let slice = &self.buf[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    primitive_accessors! {
        put_i8, get_i8, i8;
        put_u8, get_u8, u8;
        put_i16, get_i16, i16;
        put_u16, get_u16, u16;
        put_i32, get_i32, i32;
        put_u32, get_u32, u32;
        put_i64, get_i64, i64;
        put_u64, get_u64, u64;
        put_f32, get_f32, f32;
        put_f64, get_f64, f64;
    }

    /// Appends one `bool` as a single byte.
    pub fn put_bool(&mut self, x: bool) {
        self.put_u8(x as u8);
    }

    /// Reads one `bool` at the cursor; any non-zero byte is `true`.
    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    /// Appends raw bytes with a `u64` length prefix.
    pub fn put_bytes(&mut self, data: &[u8]) {
        self.put_u64(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    /// Reads a `u64`-length-prefixed byte run.
    pub fn get_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u64()?;
        self.check_prefix(len)?;
        Ok(self.take(len as usize)?.to_vec())
    }

    /// Appends a string as length-prefixed UTF-8 bytes.
    pub fn put_string(&mut self, s: &str) {
        self.put_bytes(s.as_bytes());
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::InvalidUtf8)
    }

    /// Appends a `u64` element count followed by each element.
    pub fn put_vec<T: Archivable>(&mut self, v: &[T]) {
        self.put_u64(v.len() as u64);
        for x in v {
            x.put(self);
        }
    }

    /// Reads a `u64`-count-prefixed sequence of elements.
    pub fn get_vec<T: Archivable>(&mut self) -> Result<Vec<T>> {
        let len = self.get_u64()?;
        self.check_prefix(len)?;
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(T::get(self)?);
        }
        Ok(out)
    }

    // Every element occupies at least one byte on the wire, so a count larger
    // than the remaining bytes can only come from a corrupt buffer. Rejecting
    // it here keeps `with_capacity` from amplifying garbage into huge allocs.
    fn check_prefix(&self, len: u64) -> Result<()> {
        if len > self.remaining() as u64 {
            return Err(ArchiveError::BadLengthPrefix {
                len,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

/// A value with a fixed sequential-field layout inside a [`BinaryArchive`].
pub trait Archivable: Sized {
    /// Appends this value's fields to the archive.
    fn put(&self, ar: &mut BinaryArchive);
    /// Reads one value at the archive cursor.
    fn get(ar: &mut BinaryArchive) -> Result<Self>;
}

macro_rules! archivable_primitive {
    ($($ty:ty, $put:ident, $get:ident;)*) => {
        $(
            impl Archivable for $ty {
                fn put(&self, ar: &mut BinaryArchive) {
                    ar.$put(*self);
                }
                fn get(ar: &mut BinaryArchive) -> Result<Self> {
                    ar.$get()
                }
            }
        )*
    };
}

archivable_primitive! {
    i8, put_i8, get_i8;
    u8, put_u8, get_u8;
    i16, put_i16, get_i16;
    u16, put_u16, get_u16;
    i32, put_i32, get_i32;
    u32, put_u32, get_u32;
    i64, put_i64, get_i64;
    u64, put_u64, get_u64;
    f32, put_f32, get_f32;
    f64, put_f64, get_f64;
    bool, put_bool, get_bool;
}

impl Archivable for String {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_string(self);
    }
    fn get(ar: &mut BinaryArchive) -> Result<Self> {
        ar.get_string()
    }
}

impl<T: Archivable> Archivable for Vec<T> {
    fn put(&self, ar: &mut BinaryArchive) {
        ar.put_vec(self);
    }
    fn get(ar: &mut BinaryArchive) -> Result<Self> {
        ar.get_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip() {
        let mut ar = BinaryArchive::new();
        ar.put_u8(7);
        ar.put_i16(-300);
        ar.put_u32(123_456);
        ar.put_i64(-1);
        ar.put_u64(u64::MAX);
        ar.put_f32(3.5);
        ar.put_f64(-2.25);
        ar.put_bool(true);
        ar.put_bool(false);

        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        assert_eq!(rd.get_u8().unwrap(), 7);
        assert_eq!(rd.get_i16().unwrap(), -300);
        assert_eq!(rd.get_u32().unwrap(), 123_456);
        assert_eq!(rd.get_i64().unwrap(), -1);
        assert_eq!(rd.get_u64().unwrap(), u64::MAX);
        assert_eq!(rd.get_f32().unwrap(), 3.5);
        assert_eq!(rd.get_f64().unwrap(), -2.25);
        assert!(rd.get_bool().unwrap());
        assert!(!rd.get_bool().unwrap());
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn test_vector_and_string_round_trip() {
        let mut ar = BinaryArchive::new();
        ar.put_vec(&[1.0f32, -2.0, 0.5]);
        ar.put_vec::<u64>(&[]);
        ar.put_string("dense_w");
        ar.put_string("");

        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        assert_eq!(rd.get_vec::<f32>().unwrap(), vec![1.0, -2.0, 0.5]);
        assert_eq!(rd.get_vec::<u64>().unwrap(), Vec::<u64>::new());
        assert_eq!(rd.get_string().unwrap(), "dense_w");
        assert_eq!(rd.get_string().unwrap(), "");
    }

    #[test]
    fn test_nan_round_trips_bit_exactly() {
        let weird = f32::from_bits(0x7fc0_dead);
        let mut ar = BinaryArchive::new();
        ar.put_f32(f32::NAN);
        ar.put_f32(weird);

        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        assert!(rd.get_f32().unwrap().is_nan());
        assert_eq!(rd.get_f32().unwrap().to_bits(), weird.to_bits());
    }

    #[test]
    fn test_read_past_end() {
        let mut ar = BinaryArchive::new();
        ar.put_u32(1);
        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        rd.get_u32().unwrap();
        let err = rd.get_u32().unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::ReadPastEnd {
                requested: 4,
                remaining: 0
            }
        ));
    }

    #[test]
    fn test_bad_length_prefix_rejected() {
        let mut ar = BinaryArchive::new();
        ar.put_u64(u64::MAX);
        let mut rd = BinaryArchive::from_bytes(ar.into_bytes());
        assert!(matches!(
            rd.get_vec::<f32>(),
            Err(ArchiveError::BadLengthPrefix { .. })
        ));
    }

    #[test]
    fn test_cursor_is_independent_of_writes() {
        let mut ar = BinaryArchive::new();
        ar.put_u32(1);
        ar.put_u32(2);
        assert_eq!(ar.get_u32().unwrap(), 1);
        ar.put_u32(3);
        assert_eq!(ar.get_u32().unwrap(), 2);
        assert_eq!(ar.get_u32().unwrap(), 3);
        assert_eq!(ar.position(), 12);
    }
}
