//! Chromosome name canonicalization

use super::errors::{CodecError, CodecResult};

/// Case-insensitive prefixes stripped from chromosome names, longest first
const CHROMOSOME_PREFIXES: [&str; 3] = ["chrom", "chr", "ch"];

/// Canonical form of a chromosome name.
///
/// Strips `chrom`/`chr`/`ch` prefixes (any case) as long as something
/// remains. A name that is itself a bare prefix is kept whole, so
/// `canonical_chromosome(canonical_chromosome(x)) == canonical_chromosome(x)`.
pub fn canonical_chromosome(raw: &str) -> CodecResult<String> {
    if raw.is_empty() || raw.contains('\0') {
        return Err(CodecError::InvalidChromosome(raw.to_string()));
    }

    let mut chromosome = raw;
    'strip: loop {
        if is_bare_prefix(chromosome) {
            break;
        }
        for prefix in CHROMOSOME_PREFIXES {
            if chromosome.len() > prefix.len()
                && chromosome.is_char_boundary(prefix.len())
                && chromosome[..prefix.len()].eq_ignore_ascii_case(prefix)
            {
                chromosome = &chromosome[prefix.len()..];
                continue 'strip;
            }
        }
        break;
    }

    Ok(chromosome.to_string())
}

fn is_bare_prefix(chromosome: &str) -> bool {
    CHROMOSOME_PREFIXES
        .iter()
        .any(|prefix| chromosome.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_common_prefixes() {
        assert_eq!(canonical_chromosome("chr1").unwrap(), "1");
        assert_eq!(canonical_chromosome("CHR22").unwrap(), "22");
        assert_eq!(canonical_chromosome("chrom7").unwrap(), "7");
        assert_eq!(canonical_chromosome("chX").unwrap(), "X");
        assert_eq!(canonical_chromosome("chrM").unwrap(), "M");
        assert_eq!(canonical_chromosome("chrMT").unwrap(), "MT");
    }

    #[test]
    fn test_plain_names_unchanged() {
        assert_eq!(canonical_chromosome("1").unwrap(), "1");
        assert_eq!(canonical_chromosome("X").unwrap(), "X");
        assert_eq!(canonical_chromosome("GL000192.1").unwrap(), "GL000192.1");
    }

    #[test]
    fn test_never_strips_to_empty() {
        assert_eq!(canonical_chromosome("chr").unwrap(), "chr");
        assert_eq!(canonical_chromosome("ch").unwrap(), "ch");
        assert_eq!(canonical_chromosome("CHROM").unwrap(), "CHROM");
        assert_eq!(canonical_chromosome("chrch").unwrap(), "ch");
        assert_eq!(canonical_chromosome("chrchr").unwrap(), "chr");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["chr1", "chrchr1", "chrch", "Chrom2", "ch", "chr", "chrUn_gl000220"] {
            let once = canonical_chromosome(raw).unwrap();
            let twice = canonical_chromosome(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(canonical_chromosome("").is_err());
        assert!(matches!(
            canonical_chromosome("1\u{0}2"),
            Err(CodecError::InvalidChromosome(_))
        ));
    }
}
