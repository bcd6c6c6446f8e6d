use crate::ByteOrder;
use crate::Error;
use crate::FloatSize;
use crate::Layout;
use crate::WordSize;

use ByteOrder::*;

macro_rules! define_read {
    ($func: ident, $uint: ident) => {
        #[doc = concat!("Read `", stringify!($uint), "`.")]
        fn $func(&mut self, byte_order: ByteOrder) -> Result<$uint, crate::Error> {
            let mut bytes = [0_u8; ::core::mem::size_of::<$uint>()];
            self.read_bytes(&mut bytes[..])?;
            let ret = match byte_order {
                LittleEndian => $uint::from_le_bytes(bytes),
                BigEndian => $uint::from_be_bytes(bytes),
            };
            Ok(ret)
        }
    };
}

/// Dump-specific read functions.
pub trait DumpRead {
    /// Read enough bytes to fill the buffer `buf`.
    ///
    /// Fails with [`Error::UnexpectedEof`] when the stream ends mid-buffer.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), crate::Error>;

    /// Read one byte as `u8`.
    fn read_u8(&mut self) -> Result<u8, crate::Error> {
        let mut bytes = [0_u8; 1];
        self.read_bytes(&mut bytes[..])?;
        Ok(bytes[0])
    }

    define_read!(read_u32, u32);
    define_read!(read_u64, u64);

    /// Read one native integer.
    ///
    /// Reads `u32` when the integer width is [`WordSize::Four`], reads `u64`
    /// otherwise.
    fn read_uint(&mut self, layout: Layout) -> Result<u64, crate::Error> {
        match layout.uint_size {
            WordSize::Four => self.read_u32(layout.byte_order).map(Into::into),
            WordSize::Eight => self.read_u64(layout.byte_order),
        }
    }

    /// Read one pointer.
    fn read_ptr(&mut self, layout: Layout) -> Result<u64, crate::Error> {
        match layout.ptr_size {
            WordSize::Four => self.read_u32(layout.byte_order).map(Into::into),
            WordSize::Eight => self.read_u64(layout.byte_order),
        }
    }

    /// Read `n` pointers.
    fn read_ptrs(&mut self, layout: Layout, n: usize) -> Result<Vec<u64>, crate::Error> {
        let mut ptrs = Vec::with_capacity(n);
        for _ in 0..n {
            ptrs.push(self.read_ptr(layout)?);
        }
        Ok(ptrs)
    }

    /// Read one floating-point value, converting to `f64`.
    fn read_nv(&mut self, layout: Layout) -> Result<f64, crate::Error> {
        match layout.float_size {
            FloatSize::Eight => Ok(f64::from_bits(self.read_u64(layout.byte_order)?)),
            FloatSize::Ten => {
                let mut bytes = [0_u8; 10];
                self.read_bytes(&mut bytes[..])?;
                if layout.byte_order == LittleEndian {
                    bytes.reverse();
                }
                Ok(x87_to_f64(bytes))
            }
            FloatSize::Sixteen => {
                let mut bytes = [0_u8; 16];
                self.read_bytes(&mut bytes[..])?;
                if layout.byte_order == LittleEndian {
                    bytes.reverse();
                }
                Ok(binary128_to_f64(bytes))
            }
        }
    }

    /// Read one length-prefixed byte string.
    ///
    /// A length equal to the all-ones value of the integer width means the
    /// string is absent and yields `None`, distinct from the empty string.
    fn read_str(&mut self, layout: Layout) -> Result<Option<Vec<u8>>, crate::Error> {
        let len = self.read_uint(layout)?;
        if len == layout.uint_size.sentinel() {
            return Ok(None);
        }
        let mut bytes = vec![0_u8; len as usize];
        self.read_bytes(&mut bytes[..])?;
        Ok(Some(bytes))
    }
}

impl<R: std::io::Read + ?Sized> DumpRead for R {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), crate::Error> {
        self.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
            _ => Error::Io(e),
        })
    }
}

/// A reader that counts consumed bytes.
///
/// The loader wraps its input in this to report the file offset of offending
/// tags in [`Error::UnknownTag`].
pub struct PositionReader<R> {
    inner: R,
    position: u64,
}

impl<R> PositionReader<R> {
    /// Wrap `inner`, starting the byte count at zero.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
        }
    }

    /// The number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Unwrap the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: std::io::Read> std::io::Read for PositionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// Convert an x87 80-bit extended-precision value to `f64`.
///
/// `bytes` are in big-endian order: sign and exponent first, then the 64-bit
/// significand with its explicit integer bit.
fn x87_to_f64(bytes: [u8; 10]) -> f64 {
    let sign = bytes[0] >> 7;
    let exp = (((bytes[0] & 0x7f) as i32) << 8) | bytes[1] as i32;
    let mut mant = 0_u64;
    for b in &bytes[2..10] {
        mant = (mant << 8) | *b as u64;
    }
    let negate = |x: f64| if sign == 1 { -x } else { x };
    if exp == 0x7fff {
        // The integer bit and a zero fraction mean infinity.
        return if mant << 1 == 0 {
            negate(f64::INFINITY)
        } else {
            f64::NAN
        };
    }
    if exp == 0 && mant == 0 {
        return negate(0.0);
    }
    // Pseudo-denormals (exp == 0) use the same scale as exp == 1.
    let e = if exp == 0 { 1 } else { exp };
    negate(scale_mantissa(mant, e - 16383 - 63))
}

// mant * 2^exp, stepping the scale factor so it never under- or overflows
// even when the product is representable.
fn scale_mantissa(mant: u64, mut exp: i32) -> f64 {
    let mut value = mant as f64;
    while exp > 0 {
        let step = exp.min(1000);
        value *= (step as f64).exp2();
        exp -= step;
    }
    while exp < 0 {
        let step = (-exp).min(1000);
        value /= (step as f64).exp2();
        exp += step;
    }
    value
}

/// Convert an IEEE 754 binary128 value to the nearest-representable `f64`.
///
/// `bytes` are in big-endian order.
fn binary128_to_f64(bytes: [u8; 16]) -> f64 {
    let sign = (bytes[0] >> 7) as u64;
    let exp = (((bytes[0] & 0x7f) as i32) << 8) | bytes[1] as i32;
    let mut frac = 0_u128;
    for b in &bytes[2..16] {
        frac = (frac << 8) | *b as u128;
    }
    let negate = |x: f64| if sign == 1 { -x } else { x };
    if exp == 0x7fff {
        return if frac == 0 {
            negate(f64::INFINITY)
        } else {
            f64::NAN
        };
    }
    if exp == 0 {
        // Binary128 subnormals are far below the f64 range.
        return negate(0.0);
    }
    let e64 = exp - 16383 + 1023;
    if e64 >= 0x7ff {
        return negate(f64::INFINITY);
    }
    if e64 <= 0 {
        // Subnormal in f64; fall back to arithmetic.
        let value = (1.0 + frac as f64 / 2.0_f64.powi(112)) * (((exp - 16383) as f64).exp2());
        return negate(value);
    }
    // Keep the top 52 of the 112 fraction bits.
    f64::from_bits(sign << 63 | (e64 as u64) << 52 | (frac >> 60) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use arbtest::arbtest;

    fn layout(byte_order: ByteOrder, float_size: FloatSize) -> Layout {
        Layout {
            byte_order,
            uint_size: WordSize::Eight,
            ptr_size: WordSize::Eight,
            float_size,
        }
    }

    #[test]
    fn read_primitives_both_endians() {
        let le: &[u8] = &[0x78, 0x56, 0x34, 0x12];
        assert_eq!(
            0x12345678,
            (&le[..]).read_u32(ByteOrder::LittleEndian).unwrap()
        );
        let be: &[u8] = &[0x12, 0x34, 0x56, 0x78];
        assert_eq!(0x12345678, (&be[..]).read_u32(ByteOrder::BigEndian).unwrap());
    }

    #[test]
    fn read_uint_respects_width() {
        let mut layout = layout(ByteOrder::LittleEndian, FloatSize::Eight);
        layout.uint_size = WordSize::Four;
        let bytes: &[u8] = &[0x01, 0x00, 0x00, 0x00, 0xff];
        let mut r = &bytes[..];
        assert_eq!(1, r.read_uint(layout).unwrap());
        // Only four bytes were consumed.
        assert_eq!(1, r.len());
    }

    #[test]
    fn short_read_is_truncated() {
        let bytes: &[u8] = &[0x01, 0x02];
        match (&bytes[..]).read_u32(ByteOrder::LittleEndian) {
            Err(Error::UnexpectedEof) => {}
            other => panic!("expected UnexpectedEof, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn string_sentinel_is_none() {
        let mut layout = layout(ByteOrder::LittleEndian, FloatSize::Eight);
        layout.uint_size = WordSize::Four;
        let bytes: &[u8] = &[0xff, 0xff, 0xff, 0xff];
        assert_eq!(None, (&bytes[..]).read_str(layout).unwrap());
        // A zero length is the empty string, not None.
        let bytes: &[u8] = &[0x00, 0x00, 0x00, 0x00];
        assert_eq!(Some(Vec::new()), (&bytes[..]).read_str(layout).unwrap());
    }

    #[test]
    fn read_str_round_trip() {
        arbtest(|u| {
            let expected: Vec<u8> = u.arbitrary()?;
            let layout = layout(ByteOrder::BigEndian, FloatSize::Eight);
            let mut bytes = (expected.len() as u64).to_be_bytes().to_vec();
            bytes.extend_from_slice(&expected);
            assert_eq!(Some(expected), (&bytes[..]).read_str(layout).unwrap());
            Ok(())
        });
    }

    #[test]
    fn read_nv_f64() {
        let layout = layout(ByteOrder::LittleEndian, FloatSize::Eight);
        let bytes = 1.5_f64.to_bits().to_le_bytes();
        assert_eq!(1.5, (&bytes[..]).read_nv(layout).unwrap());
    }

    #[test]
    fn read_nv_x87() {
        // 1.5 in x87 extended precision: exponent 16383, significand 0xc000...
        let le_bytes: [u8; 10] = [0, 0, 0, 0, 0, 0, 0, 0xc0, 0xff, 0x3f];
        let layout = layout(ByteOrder::LittleEndian, FloatSize::Ten);
        assert_eq!(1.5, (&le_bytes[..]).read_nv(layout).unwrap());
        let mut be_bytes = le_bytes;
        be_bytes.reverse();
        let layout = layout_big(FloatSize::Ten);
        assert_eq!(1.5, (&be_bytes[..]).read_nv(layout).unwrap());
    }

    #[test]
    fn read_nv_binary128() {
        // 1.5 in binary128: exponent 16383, top fraction bit set.
        let be_bytes: [u8; 16] = [0x3f, 0xff, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let layout = layout_big(FloatSize::Sixteen);
        assert_eq!(1.5, (&be_bytes[..]).read_nv(layout).unwrap());
    }

    #[test]
    fn x87_special_values() {
        let mut inf = [0_u8; 10];
        inf[0] = 0x7f;
        inf[1] = 0xff;
        inf[2] = 0x80;
        assert_eq!(f64::INFINITY, x87_to_f64(inf));
        let mut zero = [0_u8; 10];
        zero[0] = 0x80;
        assert_eq!(0.0, x87_to_f64(zero));
        assert!(x87_to_f64(zero).is_sign_negative());
    }

    #[test]
    fn x87_round_trips_f64_values() {
        arbtest(|u| {
            let expected: f64 = f64::from_bits(u.arbitrary()?);
            if !expected.is_finite() {
                return Ok(());
            }
            let bytes = f64_to_x87(expected);
            let actual = x87_to_f64(bytes);
            assert_eq!(expected.to_bits(), actual.to_bits(), "value {expected}");
            Ok(())
        });
    }

    // Inverse of x87_to_f64 for finite values.
    fn f64_to_x87(value: f64) -> [u8; 10] {
        let bits = value.to_bits();
        let sign = (bits >> 63) as u8;
        let exp64 = ((bits >> 52) & 0x7ff) as i32;
        let frac = bits & ((1_u64 << 52) - 1);
        let mut out = [0_u8; 10];
        let (exp80, mant): (i32, u64) = if exp64 == 0 {
            if frac == 0 {
                out[0] = sign << 7;
                return out;
            }
            // f64 subnormal: normalize into the explicit integer bit.
            let lz = frac.leading_zeros();
            (15372 - lz as i32, frac << lz)
        } else {
            (exp64 - 1023 + 16383, (1_u64 << 63) | (frac << 11))
        };
        out[0] = (sign << 7) | ((exp80 >> 8) & 0x7f) as u8;
        out[1] = (exp80 & 0xff) as u8;
        out[2..10].copy_from_slice(&mant.to_be_bytes());
        out
    }

    fn layout_big(float_size: FloatSize) -> Layout {
        Layout {
            byte_order: ByteOrder::BigEndian,
            uint_size: WordSize::Eight,
            ptr_size: WordSize::Eight,
            float_size,
        }
    }

    #[test]
    fn position_reader_counts() {
        let bytes: &[u8] = &[1, 2, 3, 4, 5];
        let mut r = PositionReader::new(&bytes[..]);
        let _ = r.read_u8().unwrap();
        let _ = r.read_u32(ByteOrder::LittleEndian).unwrap();
        assert_eq!(5, r.position());
    }
}
