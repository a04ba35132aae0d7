//! Field norms
//!
//! One byte per `(doc, field)` pair, holding
//! `encode_norm(boost * length_norm(num_tokens))`. The byte is a float8
//! with a 3-bit exponent and 5-bit mantissa; decoding goes through a
//! 256-entry table so scorers pay one array lookup per doc.

use std::sync::OnceLock;

use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput, IndexOutput};

use super::norms_file;

/// Encode a norm into the 3-exponent/5-mantissa byte representation
pub fn encode_norm(f: f32) -> u8 {
    let bits = f.to_bits() as i32;
    let small = bits >> (24 - 3);
    if small <= (63 - 15) << 3 {
        if bits <= 0 {
            0
        } else {
            1
        }
    } else if small >= ((63 - 15) << 3) + 0x100 {
        0xFF
    } else {
        (small - ((63 - 15) << 3)) as u8
    }
}

fn byte_to_float(b: u8) -> f32 {
    if b == 0 {
        return 0.0;
    }
    let mut bits = (b as u32) << (24 - 3);
    bits += (63 - 15) << 24;
    f32::from_bits(bits)
}

/// Decode a norm byte through the shared lookup table
pub fn decode_norm(b: u8) -> f32 {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut t = [0.0f32; 256];
        for (i, slot) in t.iter_mut().enumerate() {
            *slot = byte_to_float(i as u8);
        }
        t
    });
    table[b as usize]
}

/// Write one field's norm bytes (`maxDoc` of them) for `segment`
pub fn write_norms(
    dir: &dyn Directory,
    segment: &str,
    field_ord: u32,
    bytes: &[u8],
) -> Result<()> {
    let mut out = dir.create_output(&norms_file(segment, field_ord))?;
    out.write_bytes(bytes)?;
    out.finish()
}

/// Read one field's norm bytes, validating the length against `max_doc`
pub fn read_norms(
    dir: &dyn Directory,
    segment: &str,
    field_ord: u32,
    max_doc: u32,
) -> Result<Vec<u8>> {
    let name = norms_file(segment, field_ord);
    let mut input = dir.open_input(&name)?;
    if input.len() != max_doc as u64 {
        return Err(NautexError::corrupt(format!(
            "norms file {} has {} bytes, expected {}",
            name,
            input.len(),
            max_doc
        )));
    }
    let mut bytes = vec![0u8; max_doc as usize];
    input.read_bytes(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use crate::store::RamDirectory;

    use super::*;

    #[test]
    fn test_zero_and_saturation() {
        assert_eq!(encode_norm(0.0), 0);
        assert_eq!(decode_norm(0), 0.0);
        assert_eq!(encode_norm(-1.0), 0);
        assert_eq!(encode_norm(f32::MAX), 0xFF);
        // tiny positive values round up to the smallest representable norm
        assert_eq!(encode_norm(1e-30), 1);
        assert!(decode_norm(1) > 0.0);
    }

    #[test]
    fn test_monotone_roundtrip() {
        // decode(encode(x)) is within one quantization step, and encoded
        // values preserve ordering
        let mut last = -1.0f32;
        for i in 1..=64 {
            let x = i as f32 / 16.0;
            let decoded = decode_norm(encode_norm(x));
            assert!(decoded >= last, "norm codec not monotone at {x}");
            assert!(decoded <= x * 2.0 && decoded >= x / 2.0);
            last = decoded;
        }
    }

    #[test]
    fn test_decode_is_fixed_point_of_encode() {
        for b in 0..=255u8 {
            assert_eq!(encode_norm(decode_norm(b)), b);
        }
    }

    #[test]
    fn test_norms_file_roundtrip() {
        let dir = RamDirectory::new();
        let bytes = vec![encode_norm(1.0), encode_norm(0.5), 0];
        write_norms(&dir, "_0", 2, &bytes).unwrap();
        let read = read_norms(&dir, "_0", 2, 3).unwrap();
        assert_eq!(read, bytes);

        // wrong maxDoc is corruption
        assert!(matches!(
            read_norms(&dir, "_0", 2, 5),
            Err(NautexError::CorruptIndex(_))
        ));
    }
}
