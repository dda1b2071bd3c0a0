//! Row-key encoding and decoding
//!
//! Layout: `chromosome | 0x00 | position (u32 BE) | reference | (0x00 | alternate)?`
//!
//! Keys longer than `max_row_length` replace both alleles with `#` + their
//! 32-bit string hash; the original alleles travel in `AuxiliaryAlleles`.

use serde::{Deserialize, Serialize};

use super::chromosome::canonical_chromosome;
use super::errors::{CodecError, CodecResult};
use super::variant::{split_symbolic_alternate, StructuralBounds, VariantCoordinates, VariantType};

/// Longest row key written with plain alleles
pub const DEFAULT_MAX_ROW_LENGTH: usize = 4096;

/// Field separator inside a row key
pub const KEY_SEPARATOR: u8 = 0x00;

/// Marks a hashed allele
pub const HASH_MARKER: char = '#';

const POSITION_BYTES: usize = 4;

/// Original alleles of a hashed row key, stored in `TYPE` and `ALLELES`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryAlleles {
    pub variant_type: VariantType,
    /// `REF,ALT`
    pub alleles: String,
}

impl AuxiliaryAlleles {
    pub fn new(variant_type: VariantType, reference: &str, alternate: &str) -> Self {
        Self {
            variant_type,
            alleles: format!("{},{}", reference, alternate),
        }
    }

    /// Split `alleles` on the first comma
    pub fn split(&self) -> CodecResult<(&str, &str)> {
        self.alleles
            .split_once(',')
            .ok_or_else(|| CodecError::MalformedAuxiliary(self.alleles.clone()))
    }
}

/// Result of encoding a variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedKey {
    pub key: Vec<u8>,
    /// Present only when the alleles were hashed
    pub auxiliary: Option<AuxiliaryAlleles>,
}

impl EncodedKey {
    pub fn is_hashed(&self) -> bool {
        self.auxiliary.is_some()
    }
}

/// Result of decoding a row key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub chromosome: String,
    pub position: u32,
    /// `None` for position-only keys
    pub reference: Option<String>,
    /// `None` for position-only keys
    pub alternate: Option<String>,
    pub bounds: Option<StructuralBounds>,
}

/// Converts variant coordinates to and from row keys
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec {
    max_row_length: usize,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROW_LENGTH)
    }
}

impl KeyCodec {
    pub fn new(max_row_length: usize) -> Self {
        Self { max_row_length }
    }

    pub fn max_row_length(&self) -> usize {
        self.max_row_length
    }

    /// Encode a variant into its row key
    pub fn encode(&self, coords: &VariantCoordinates) -> CodecResult<EncodedKey> {
        let chromosome = canonical_chromosome(&coords.chromosome)?;
        if coords.reference.starts_with(HASH_MARKER) {
            return Err(CodecError::ReservedReference(coords.reference.clone()));
        }
        let alternate = coords.key_alternate();
        if coords.reference.is_empty() && alternate.is_empty() {
            return Err(CodecError::EmptyAlleles);
        }

        let length = key_length(&chromosome, &coords.reference, &alternate);
        if length <= self.max_row_length {
            return Ok(EncodedKey {
                key: build_key(&chromosome, coords.position, &coords.reference, &alternate),
                auxiliary: None,
            });
        }

        let hashed_reference = hashed_allele(&coords.reference);
        let hashed_alternate = if alternate.is_empty() {
            String::new()
        } else {
            hashed_allele(&alternate)
        };
        let hashed_length = key_length(&chromosome, &hashed_reference, &hashed_alternate);
        if hashed_length > self.max_row_length {
            return Err(CodecError::KeyTooLong {
                length: hashed_length,
                max: self.max_row_length,
            });
        }

        Ok(EncodedKey {
            key: build_key(&chromosome, coords.position, &hashed_reference, &hashed_alternate),
            auxiliary: Some(AuxiliaryAlleles::new(
                coords.resolved_type(),
                &coords.reference,
                &alternate,
            )),
        })
    }

    /// Key prefix for a region scan starting at `position`
    pub fn encode_position(&self, chromosome: &str, position: u32) -> CodecResult<Vec<u8>> {
        let chromosome = canonical_chromosome(chromosome)?;
        let mut key = Vec::with_capacity(chromosome.len() + 1 + POSITION_BYTES);
        key.extend_from_slice(chromosome.as_bytes());
        key.push(KEY_SEPARATOR);
        key.extend_from_slice(&position.to_be_bytes());
        Ok(key)
    }

    /// Decode a row key. Hashed keys need the auxiliary values of the row.
    pub fn decode(&self, key: &[u8], auxiliary: Option<&AuxiliaryAlleles>) -> CodecResult<DecodedKey> {
        let separator = key
            .iter()
            .position(|b| *b == KEY_SEPARATOR)
            .ok_or_else(|| CodecError::MalformedKey("missing chromosome separator".to_string()))?;
        let chromosome = utf8(&key[..separator])?;
        if chromosome.is_empty() {
            return Err(CodecError::MalformedKey("empty chromosome".to_string()));
        }

        let position_start = separator + 1;
        let position_end = position_start + POSITION_BYTES;
        if key.len() < position_end {
            return Err(CodecError::MalformedKey("truncated position".to_string()));
        }
        let mut position_bytes = [0u8; POSITION_BYTES];
        position_bytes.copy_from_slice(&key[position_start..position_end]);
        let position = u32::from_be_bytes(position_bytes);

        let tail = &key[position_end..];
        if tail.is_empty() {
            return Ok(DecodedKey {
                chromosome,
                position,
                reference: None,
                alternate: None,
                bounds: None,
            });
        }

        let (reference, key_alternate) = match tail.iter().position(|b| *b == KEY_SEPARATOR) {
            Some(idx) => (utf8(&tail[..idx])?, utf8(&tail[idx + 1..])?),
            None => (utf8(tail)?, String::new()),
        };

        let (reference, key_alternate) = if reference.starts_with(HASH_MARKER) {
            let auxiliary = auxiliary.ok_or(CodecError::MissingAuxiliary)?;
            let (original_reference, original_alternate) = auxiliary.split()?;
            if hashed_allele(original_reference) != reference {
                return Err(CodecError::MalformedAuxiliary(format!(
                    "alleles {} do not match hashed key",
                    auxiliary.alleles
                )));
            }
            (original_reference.to_string(), original_alternate.to_string())
        } else {
            (reference, key_alternate)
        };

        let (alternate, bounds) = split_symbolic_alternate(&key_alternate)?;
        Ok(DecodedKey {
            chromosome,
            position,
            reference: Some(reference),
            alternate: Some(alternate),
            bounds,
        })
    }
}

/// 32-bit signed polynomial hash over UTF-16 code units (`h = 31 * h + c`)
pub fn java_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

fn hashed_allele(allele: &str) -> String {
    format!("{}{}", HASH_MARKER, java_hash(allele))
}

fn key_length(chromosome: &str, reference: &str, alternate: &str) -> usize {
    let alternate_length = if alternate.is_empty() { 0 } else { 1 + alternate.len() };
    chromosome.len() + 1 + POSITION_BYTES + reference.len() + alternate_length
}

fn build_key(chromosome: &str, position: u32, reference: &str, alternate: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_length(chromosome, reference, alternate));
    key.extend_from_slice(chromosome.as_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(&position.to_be_bytes());
    key.extend_from_slice(reference.as_bytes());
    if !alternate.is_empty() {
        key.push(KEY_SEPARATOR);
        key.extend_from_slice(alternate.as_bytes());
    }
    key
}

fn utf8(bytes: &[u8]) -> CodecResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CodecError::MalformedKey("invalid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snv() -> VariantCoordinates {
        VariantCoordinates::new("chr1", 1000, "A", "C")
    }

    // =========================================================================
    // Layout
    // =========================================================================

    #[test]
    fn test_key_layout() {
        let encoded = KeyCodec::default().encode(&snv()).unwrap();
        assert_eq!(
            encoded.key,
            vec![b'1', 0x00, 0x00, 0x00, 0x03, 0xE8, b'A', 0x00, b'C']
        );
        assert!(!encoded.is_hashed());
    }

    #[test]
    fn test_empty_alternate_omits_separator() {
        let coords = VariantCoordinates::new("2", 5, "AT", "");
        let encoded = KeyCodec::default().encode(&coords).unwrap();
        assert_eq!(encoded.key, vec![b'2', 0x00, 0, 0, 0, 5, b'A', b'T']);
        let decoded = KeyCodec::default().decode(&encoded.key, None).unwrap();
        assert_eq!(decoded.reference.as_deref(), Some("AT"));
        assert_eq!(decoded.alternate.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_reference_round_trip() {
        let coords = VariantCoordinates::new("2", 5, "", "GG");
        let codec = KeyCodec::default();
        let decoded = codec.decode(&codec.encode(&coords).unwrap().key, None).unwrap();
        assert_eq!(decoded.reference.as_deref(), Some(""));
        assert_eq!(decoded.alternate.as_deref(), Some("GG"));
    }

    #[test]
    fn test_position_only_key() {
        let codec = KeyCodec::default();
        let key = codec.encode_position("chr3", 77).unwrap();
        let decoded = codec.decode(&key, None).unwrap();
        assert_eq!(decoded.chromosome, "3");
        assert_eq!(decoded.position, 77);
        assert_eq!(decoded.reference, None);
        assert_eq!(decoded.alternate, None);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_reserved_reference_rejected() {
        let coords = VariantCoordinates::new("1", 1, "#12", "A");
        assert!(matches!(
            KeyCodec::default().encode(&coords),
            Err(CodecError::ReservedReference(_))
        ));
    }

    #[test]
    fn test_empty_alleles_rejected() {
        let coords = VariantCoordinates::new("1", 1, "", "");
        assert_eq!(KeyCodec::default().encode(&coords), Err(CodecError::EmptyAlleles));
    }

    #[test]
    fn test_truncated_keys_rejected() {
        let codec = KeyCodec::default();
        assert!(codec.decode(b"1", None).is_err());
        assert!(codec.decode(&[b'1', 0x00, 0x01], None).is_err());
        assert!(codec.decode(&[0x00, 0, 0, 0, 1], None).is_err());
    }

    // =========================================================================
    // Overflow
    // =========================================================================

    #[test]
    fn test_java_hash_matches_reference_values() {
        assert_eq!(java_hash(""), 0);
        assert_eq!(java_hash("a"), 97);
        assert_eq!(java_hash("hello"), 99162322);
        // Wraps around i32
        assert_eq!(java_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_overflow_hashes_both_alleles() {
        let codec = KeyCodec::new(64);
        let reference = "A".repeat(100);
        let coords = VariantCoordinates::new("1", 10, reference.clone(), "T");
        let encoded = codec.encode(&coords).unwrap();

        let auxiliary = encoded.auxiliary.clone().unwrap();
        assert_eq!(auxiliary.variant_type, VariantType::Indel);
        assert_eq!(auxiliary.alleles, format!("{},T", reference));

        let expected_tail = format!("#{}\u{0}#{}", java_hash(&reference), java_hash("T"));
        assert!(encoded.key.ends_with(expected_tail.as_bytes()));
        assert!(encoded.key.len() <= 64);
    }

    #[test]
    fn test_overflow_is_deterministic() {
        let codec = KeyCodec::new(64);
        let coords = VariantCoordinates::new("1", 10, "C".repeat(80), "G".repeat(3));
        assert_eq!(codec.encode(&coords).unwrap(), codec.encode(&coords).unwrap());
    }

    #[test]
    fn test_hashed_key_needs_auxiliary() {
        let codec = KeyCodec::new(64);
        let coords = VariantCoordinates::new("1", 10, "C".repeat(80), "G");
        let encoded = codec.encode(&coords).unwrap();
        assert_eq!(codec.decode(&encoded.key, None), Err(CodecError::MissingAuxiliary));

        let decoded = codec.decode(&encoded.key, encoded.auxiliary.as_ref()).unwrap();
        assert_eq!(decoded.reference, Some("C".repeat(80)));
        assert_eq!(decoded.alternate.as_deref(), Some("G"));
    }

    #[test]
    fn test_mismatched_auxiliary_rejected() {
        let codec = KeyCodec::new(64);
        let coords = VariantCoordinates::new("1", 10, "C".repeat(80), "G");
        let encoded = codec.encode(&coords).unwrap();
        let wrong = AuxiliaryAlleles::new(VariantType::Indel, "A", "G");
        assert!(matches!(
            codec.decode(&encoded.key, Some(&wrong)),
            Err(CodecError::MalformedAuxiliary(_))
        ));
    }

    #[test]
    fn test_hashed_key_still_too_long() {
        let codec = KeyCodec::new(20);
        let coords = VariantCoordinates::new("X".repeat(30), 10, "C".repeat(80), "G");
        assert!(matches!(codec.encode(&coords), Err(CodecError::KeyTooLong { .. })));
    }

    // =========================================================================
    // Symbolic alleles
    // =========================================================================

    #[test]
    fn test_symbolic_bounds_round_trip() {
        let bounds = StructuralBounds::new(5000).with_ci_start(90, 110);
        let coords = VariantCoordinates::new("5", 100, "N", "<DEL>").with_bounds(bounds);
        let codec = KeyCodec::default();
        let encoded = codec.encode(&coords).unwrap();
        let decoded = codec.decode(&encoded.key, None).unwrap();
        assert_eq!(decoded.alternate.as_deref(), Some("<DEL>"));
        assert_eq!(decoded.bounds, Some(bounds));
    }
}
