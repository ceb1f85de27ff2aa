//! Primitive wire encoding and decoding.
//!
//! All integers are big-endian on the wire regardless of host byte order.
//! Strings and byte blobs are prefixed with a signed 32-bit big-endian
//! count. Floats use the protocol's mantissa/exponent format.
//!
//! Decoding never reads past the end of the buffer: on underflow a `get_*`
//! call returns the zero/empty value of its type and advances the position
//! only by what was actually consumed. Structural validation (and every
//! error path) belongs to the framing layer.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

/// `1 << 30`, the fixed-point scale of the wire float format.
const MANTISSA_SCALE: f64 = 1_073_741_824.0;

pub(crate) fn put_i32(buf: &mut Vec<u8>, v: i32) {
    // Writes to a Vec cannot fail.
    let _ = buf.write_i32::<BigEndian>(v);
}

pub(crate) fn put_i64(buf: &mut Vec<u8>, v: i64) {
    let _ = buf.write_i64::<BigEndian>(v);
}

pub(crate) fn put_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

pub(crate) fn put_str(buf: &mut Vec<u8>, v: &str) {
    put_i32(buf, v.len() as i32);
    buf.extend_from_slice(v.as_bytes());
}

pub(crate) fn put_bytes(buf: &mut Vec<u8>, v: &[u8]) {
    put_i32(buf, v.len() as i32);
    buf.extend_from_slice(v);
}

/// Encode `value` as two big-endian 32-bit words: a mantissa scaled by
/// `2^30` and a binary exponent, normalised so the scaled mantissa
/// magnitude lies in `[0.5, 1)` for non-zero values. The sign rides on the
/// mantissa.
pub(crate) fn put_f64(buf: &mut Vec<u8>, value: f64) {
    // The format has no representation for NaN or the infinities.
    if !value.is_finite() {
        put_i32(buf, 0);
        put_i32(buf, 0);
        return;
    }
    let mut temp = value.abs();
    let mut exponent = 0i32;
    if temp != 0.0 && temp < 0.5 {
        while temp < 0.5 {
            temp *= 2.0;
            exponent -= 1;
        }
    } else {
        while temp >= 1.0 {
            temp /= 2.0;
            exponent += 1;
        }
    }
    if value < 0.0 {
        temp = -temp;
    }
    let mantissa = (temp * MANTISSA_SCALE).round() as i32;
    put_i32(buf, mantissa);
    put_i32(buf, exponent);
}

/// A positioned reader over an encoded packet.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub(crate) fn get_i32(&mut self) -> i32 {
        if self.remaining() < 4 {
            return 0;
        }
        let v = BigEndian::read_i32(&self.buf[self.pos..]);
        self.pos += 4;
        v
    }

    pub(crate) fn get_i64(&mut self) -> i64 {
        if self.remaining() < 8 {
            return 0;
        }
        let v = BigEndian::read_i64(&self.buf[self.pos..]);
        self.pos += 8;
        v
    }

    pub(crate) fn get_bool(&mut self) -> bool {
        if self.remaining() < 1 {
            return false;
        }
        let v = self.buf[self.pos] != 0;
        self.pos += 1;
        v
    }

    /// Read a length-prefixed string.
    ///
    /// The length word is consumed even when the declared body does not fit
    /// in the buffer; the body is consumed only when it does.
    pub(crate) fn get_str(&mut self) -> String {
        let len = self.get_i32();
        if len <= 0 || len as usize > self.remaining() {
            return String::new();
        }
        let bytes = &self.buf[self.pos..self.pos + len as usize];
        self.pos += len as usize;
        String::from_utf8_lossy(bytes).into_owned()
    }

    pub(crate) fn get_bytes(&mut self) -> Vec<u8> {
        let len = self.get_i32();
        if len <= 0 || len as usize > self.remaining() {
            return Vec::new();
        }
        let bytes = self.buf[self.pos..self.pos + len as usize].to_vec();
        self.pos += len as usize;
        bytes
    }

    /// Decode the mantissa/exponent float format, rounding the recovered
    /// value to 9 significant decimal digits to hide the quantisation
    /// noise.
    pub(crate) fn get_f64(&mut self) -> f64 {
        if self.remaining() < 8 {
            return 0.0;
        }
        let mantissa = self.get_i32();
        let exponent = self.get_i32();
        let mut value = f64::from(mantissa) / MANTISSA_SCALE;
        value *= 2f64.powi(exponent);
        if value != 0.0 && value.is_finite() {
            let digits = (value.abs().log10().floor() + 1.0) as i32;
            let factor = 10f64.powi(9 - digits);
            if factor.is_finite() && factor != 0.0 {
                value = (value * factor + 0.5).floor() / factor;
            }
        }
        value
    }
}
