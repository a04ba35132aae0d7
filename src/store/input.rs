//! Random-access input streams and the on-disk integer/string codec
//!
//! Multi-byte integers are VInt/VLong coded: 7 data bits per byte, high bit
//! set on every byte but the last. Strings are a VInt count of UTF-16 code
//! units followed by Java-style modified UTF-8 (NUL as two bytes,
//! supplementary planes as surrogate pairs). Fixed-width integers are
//! big-endian.

use crate::error::{NautexError, Result};

/// A positioned, cloneable read cursor over one index file
pub trait IndexInput: Send + Sync {
    fn read_byte(&mut self) -> Result<u8>;

    /// Fill `buf` completely or fail with `CorruptIndex` on EOF
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current absolute position
    fn tell(&self) -> u64;

    /// Total file length in bytes
    fn len(&self) -> u64;

    /// Independent cursor over the same file, positioned like this one
    fn clone_input(&self) -> Result<Box<dyn IndexInput>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.tell())
    }

    /// VInt: at most five bytes
    fn read_vint(&mut self) -> Result<u32> {
        let mut b = self.read_byte()?;
        let mut value = (b & 0x7F) as u32;
        let mut shift = 7u32;
        while b & 0x80 != 0 {
            if shift > 28 {
                return Err(NautexError::corrupt("VInt longer than five bytes"));
            }
            b = self.read_byte()?;
            value |= ((b & 0x7F) as u32) << shift;
            shift += 7;
        }
        Ok(value)
    }

    /// VLong: at most ten bytes
    fn read_vlong(&mut self) -> Result<u64> {
        let mut b = self.read_byte()?;
        let mut value = (b & 0x7F) as u64;
        let mut shift = 7u32;
        while b & 0x80 != 0 {
            if shift > 63 {
                return Err(NautexError::corrupt("VLong longer than ten bytes"));
            }
            b = self.read_byte()?;
            value |= ((b & 0x7F) as u64) << shift;
            shift += 7;
        }
        Ok(value)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Modified UTF-8 string, prefixed by its UTF-16 code unit count
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as u64;
        if len > self.remaining() {
            return Err(NautexError::corrupt(format!(
                "string length {} exceeds remaining file bytes {}",
                len,
                self.remaining()
            )));
        }

        let mut units: Vec<u16> = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let b = self.read_byte()?;
            let unit = match b >> 4 {
                0x0..=0x7 => b as u16,
                0xC | 0xD => {
                    let b2 = self.read_byte()?;
                    if b2 & 0xC0 != 0x80 {
                        return Err(NautexError::corrupt("malformed two-byte character"));
                    }
                    (((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16
                }
                0xE => {
                    let b2 = self.read_byte()?;
                    let b3 = self.read_byte()?;
                    if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                        return Err(NautexError::corrupt("malformed three-byte character"));
                    }
                    (((b & 0x0F) as u16) << 12)
                        | (((b2 & 0x3F) as u16) << 6)
                        | (b3 & 0x3F) as u16
                }
                _ => return Err(NautexError::corrupt("invalid modified UTF-8 lead byte")),
            };
            units.push(unit);
        }

        String::from_utf16(&units)
            .map_err(|_| NautexError::corrupt("unpaired surrogate in string"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::output::{IndexOutput, RamOutput};
    use super::*;

    fn roundtrip(write: impl FnOnce(&mut RamOutput)) -> Box<dyn IndexInput> {
        let mut out = RamOutput::new();
        write(&mut out);
        out.into_input()
    }

    #[test]
    fn test_vint_roundtrip() {
        let mut input = roundtrip(|out| {
            for v in [0u32, 1, 127, 128, 16383, 16384, u32::MAX] {
                out.write_vint(v).unwrap();
            }
        });
        for expected in [0u32, 1, 127, 128, 16383, 16384, u32::MAX] {
            assert_eq!(input.read_vint().unwrap(), expected);
        }
    }

    #[test]
    fn test_vlong_roundtrip() {
        let mut input = roundtrip(|out| {
            for v in [0u64, 1, 1 << 35, u64::MAX] {
                out.write_vlong(v).unwrap();
            }
        });
        for expected in [0u64, 1, 1 << 35, u64::MAX] {
            assert_eq!(input.read_vlong().unwrap(), expected);
        }
    }

    #[test]
    fn test_vint_overflow_rejected() {
        let mut out = RamOutput::new();
        for _ in 0..6 {
            out.write_byte(0xFF).unwrap();
        }
        let mut input = out.into_input();
        match input.read_vint() {
            Err(NautexError::CorruptIndex(_)) => {}
            other => panic!("expected CorruptIndex, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_string_roundtrip() {
        let cases = [
            "",
            "hello",
            "na\u{0} terminated",
            "sm\u{00f6}rg\u{00e5}sbord",
            "\u{4e2d}\u{6587}",
            "outside bmp: \u{1f600}",
        ];
        let mut input = roundtrip(|out| {
            for s in &cases {
                out.write_string(s).unwrap();
            }
        });
        for expected in &cases {
            assert_eq!(&input.read_string().unwrap(), expected);
        }
    }

    #[test]
    fn test_string_length_past_eof() {
        let mut out = RamOutput::new();
        out.write_vint(1000).unwrap(); // claims 1000 units, file ends here
        let mut input = out.into_input();
        assert!(matches!(
            input.read_string(),
            Err(NautexError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut input = roundtrip(|out| {
            out.write_i32(-9).unwrap();
            out.write_i64(i64::MAX).unwrap();
            out.write_f32(1.5).unwrap();
        });
        assert_eq!(input.read_i32().unwrap(), -9);
        assert_eq!(input.read_i64().unwrap(), i64::MAX);
        assert_eq!(input.read_f32().unwrap(), 1.5);
    }

    #[test]
    fn test_seek_and_clone() {
        let mut input = roundtrip(|out| {
            out.write_vint(7).unwrap();
            out.write_vint(300).unwrap();
        });
        assert_eq!(input.read_vint().unwrap(), 7);

        let mut twin = input.clone_input().unwrap();
        assert_eq!(twin.read_vint().unwrap(), 300);

        input.seek(0).unwrap();
        assert_eq!(input.read_vint().unwrap(), 7);
    }
}
