//! Pre-allocated Encoder / cursor-owning Decoder
//!
//! Encoder menulis ke buffer yang ukurannya sudah dihitung oleh size pass;
//! tidak ada realokasi di tengah encode. Decoder membawa posisi bacanya
//! sendiri sehingga setiap nested read otomatis memajukan cursor.
//!
//! Semua multi-byte integer big-endian.

use crate::error::CodecError;

/// Fixed-capacity big-endian writer
pub struct Encoder {
    buffer: Box<[u8]>,
    write_pos: usize,
}

impl Encoder {
    /// Membuat encoder dengan buffer size tertentu
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            write_pos: 0,
        }
    }

    /// Slot `n` byte berikutnya. Melebihi kapasitas berarti size pass
    /// dan encode pass tidak sepakat.
    #[inline(always)]
    fn reserve(&mut self, n: usize) -> Result<&mut [u8], CodecError> {
        let end = self.write_pos + n;
        if end > self.buffer.len() {
            return Err(CodecError::SizeMismatch {
                predicted: self.buffer.len(),
                written: end,
            });
        }
        let slot = &mut self.buffer[self.write_pos..end];
        self.write_pos = end;
        Ok(slot)
    }

    #[inline(always)]
    pub fn put_u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.reserve(1)?[0] = v;
        Ok(())
    }

    #[inline(always)]
    pub fn put_u16(&mut self, v: u16) -> Result<(), CodecError> {
        self.reserve(2)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn put_i16(&mut self, v: i16) -> Result<(), CodecError> {
        self.reserve(2)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn put_i32(&mut self, v: i32) -> Result<(), CodecError> {
        self.reserve(4)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn put_i64(&mut self, v: i64) -> Result<(), CodecError> {
        self.reserve(8)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn put_f32(&mut self, v: f32) -> Result<(), CodecError> {
        self.reserve(4)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn put_f64(&mut self, v: f64) -> Result<(), CodecError> {
        self.reserve(8)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// Posisi tulis saat ini
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.write_pos
    }

    /// Available space in buffer
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.write_pos
    }

    /// Buffer penuh sebagai `Vec`. Gagal jika belum terisi sampai kapasitas.
    pub fn finish(self) -> Result<Vec<u8>, CodecError> {
        if self.write_pos != self.buffer.len() {
            return Err(CodecError::SizeMismatch {
                predicted: self.buffer.len(),
                written: self.write_pos,
            });
        }
        Ok(self.buffer.into_vec())
    }
}

/// Zero-copy big-endian reader
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> Decoder<'a> {
    /// Membuat decoder dari buffer
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Decoder yang mulai dari `cursor`
    pub fn at(buffer: &'a [u8], cursor: usize) -> Result<Self, CodecError> {
        if cursor > buffer.len() {
            return Err(CodecError::Truncated {
                offset: buffer.len(),
                needed: cursor - buffer.len(),
                available: 0,
            });
        }
        Ok(Self {
            buffer,
            read_pos: cursor,
        })
    }

    /// Ambil `n` byte berikutnya (zero-copy) dan majukan cursor
    #[inline(always)]
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.remaining();
        if n > available {
            return Err(CodecError::Truncated {
                offset: self.read_pos,
                needed: n,
                available,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.buffer[start..self.read_pos])
    }

    #[inline(always)]
    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    #[inline(always)]
    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    #[inline(always)]
    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        self.take_array().map(u16::from_be_bytes)
    }

    #[inline(always)]
    pub fn get_i16(&mut self) -> Result<i16, CodecError> {
        self.take_array().map(i16::from_be_bytes)
    }

    #[inline(always)]
    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        self.take_array().map(i32::from_be_bytes)
    }

    #[inline(always)]
    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        self.take_array().map(i64::from_be_bytes)
    }

    #[inline(always)]
    pub fn get_f32(&mut self) -> Result<f32, CodecError> {
        self.take_array().map(f32::from_be_bytes)
    }

    #[inline(always)]
    pub fn get_f64(&mut self) -> Result<f64, CodecError> {
        self.take_array().map(f64::from_be_bytes)
    }

    /// Posisi baca saat ini
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut encoder = Encoder::new(2 + 4 + 8);
        encoder.put_i16(0x0102).unwrap();
        encoder.put_i32(0x0304_0506).unwrap();
        encoder.put_i64(-1).unwrap();

        let bytes = encoder.finish().unwrap();
        assert_eq!(&bytes[..6], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&bytes[6..], &[0xff; 8]);
    }

    #[test]
    fn test_overflow_is_size_mismatch() {
        let mut encoder = Encoder::new(3);
        assert!(encoder.put_i32(7).is_err());
        assert_eq!(encoder.position(), 0);
    }

    #[test]
    fn test_short_buffer_rejected_on_finish() {
        let mut encoder = Encoder::new(4);
        encoder.put_u16(1).unwrap();
        assert_eq!(encoder.available(), 2);
        assert!(matches!(
            encoder.finish(),
            Err(CodecError::SizeMismatch { predicted: 4, written: 2 })
        ));
    }

    #[test]
    fn test_decoder_advances_and_truncates() {
        let data = [0x00, 0x2a, 0x40, 0x49, 0x0f, 0xdb];
        let mut decoder = Decoder::new(&data);

        assert_eq!(decoder.get_i16().unwrap(), 42);
        assert_eq!(decoder.position(), 2);
        assert!((decoder.get_f32().unwrap() - std::f32::consts::PI).abs() < 1e-6);
        assert_eq!(decoder.remaining(), 0);

        match decoder.get_u8() {
            Err(CodecError::Truncated { offset, needed, available }) => {
                assert_eq!((offset, needed, available), (6, 1, 0));
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_decoder_at_cursor() {
        let data = [9u8, 8, 7];
        let mut decoder = Decoder::at(&data, 2).unwrap();
        assert_eq!(decoder.get_u8().unwrap(), 7);
        assert!(Decoder::at(&data, 4).is_err());
    }
}
