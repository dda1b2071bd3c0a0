//! Variant coordinates, variant types and symbolic-allele folding

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{CodecError, CodecResult};

/// Separator between a symbolic allele and its structural bounds
const SYMBOLIC_SEPARATOR: char = '|';

/// Variant type tag stored in the `TYPE` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantType {
    Snv,
    Mnv,
    Indel,
    Insertion,
    Deletion,
    Sv,
    Cnv,
    Duplication,
    Inversion,
    Breakend,
    NoVariation,
    Symbolic,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Snv => "SNV",
            VariantType::Mnv => "MNV",
            VariantType::Indel => "INDEL",
            VariantType::Insertion => "INSERTION",
            VariantType::Deletion => "DELETION",
            VariantType::Sv => "SV",
            VariantType::Cnv => "CNV",
            VariantType::Duplication => "DUPLICATION",
            VariantType::Inversion => "INVERSION",
            VariantType::Breakend => "BREAKEND",
            VariantType::NoVariation => "NO_VARIATION",
            VariantType::Symbolic => "SYMBOLIC",
        }
    }

    /// Infer the type from the alleles
    pub fn infer(reference: &str, alternate: &str) -> Self {
        if alternate == "." {
            return VariantType::NoVariation;
        }
        if alternate.contains('[') || alternate.contains(']') {
            return VariantType::Breakend;
        }
        if is_symbolic(alternate) {
            let inner = &alternate[1..alternate.len() - 1];
            let head = inner.split(':').next().unwrap_or(inner);
            return match head {
                "DEL" => VariantType::Deletion,
                "INS" => VariantType::Insertion,
                "DUP" => VariantType::Duplication,
                "INV" => VariantType::Inversion,
                "CNV" => VariantType::Cnv,
                _ => VariantType::Symbolic,
            };
        }
        match (reference.len(), alternate.len()) {
            (0, _) => VariantType::Insertion,
            (_, 0) => VariantType::Deletion,
            (1, 1) => VariantType::Snv,
            (r, a) if r == a => VariantType::Mnv,
            _ => VariantType::Indel,
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariantType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.to_ascii_uppercase().as_str() {
            "SNV" | "SNP" => VariantType::Snv,
            "MNV" | "MNP" => VariantType::Mnv,
            "INDEL" => VariantType::Indel,
            "INSERTION" => VariantType::Insertion,
            "DELETION" => VariantType::Deletion,
            "SV" => VariantType::Sv,
            "CNV" => VariantType::Cnv,
            "DUPLICATION" => VariantType::Duplication,
            "INVERSION" => VariantType::Inversion,
            "BREAKEND" => VariantType::Breakend,
            "NO_VARIATION" => VariantType::NoVariation,
            "SYMBOLIC" => VariantType::Symbolic,
            other => {
                return Err(CodecError::MalformedAuxiliary(format!(
                    "unknown variant type {}",
                    other
                )))
            }
        };
        Ok(parsed)
    }
}

/// End coordinate and confidence intervals of a structural variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralBounds {
    pub end: u32,
    pub ci_start: Option<(u32, u32)>,
    pub ci_end: Option<(u32, u32)>,
}

impl StructuralBounds {
    pub fn new(end: u32) -> Self {
        Self {
            end,
            ci_start: None,
            ci_end: None,
        }
    }

    pub fn with_ci_start(mut self, left: u32, right: u32) -> Self {
        self.ci_start = Some((left, right));
        self
    }

    pub fn with_ci_end(mut self, left: u32, right: u32) -> Self {
        self.ci_end = Some((left, right));
        self
    }
}

/// Coordinates identifying a single variant row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCoordinates {
    pub chromosome: String,
    pub position: u32,
    pub reference: String,
    pub alternate: String,
    #[serde(default)]
    pub bounds: Option<StructuralBounds>,
    #[serde(default)]
    pub variant_type: Option<VariantType>,
}

impl VariantCoordinates {
    pub fn new(
        chromosome: impl Into<String>,
        position: u32,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            reference: reference.into(),
            alternate: alternate.into(),
            bounds: None,
            variant_type: None,
        }
    }

    pub fn with_bounds(mut self, bounds: StructuralBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_type(mut self, variant_type: VariantType) -> Self {
        self.variant_type = Some(variant_type);
        self
    }

    /// Explicit type, or the one inferred from the alleles
    pub fn resolved_type(&self) -> VariantType {
        self.variant_type
            .unwrap_or_else(|| VariantType::infer(&self.reference, &self.alternate))
    }

    /// Alternate as stored in the row key, with bounds folded into symbolic alleles
    pub fn key_alternate(&self) -> String {
        match self.bounds {
            Some(bounds) if is_symbolic(&self.alternate) => {
                fold_symbolic_alternate(&self.alternate, &bounds)
            }
            _ => self.alternate.clone(),
        }
    }
}

/// `<...>` alleles such as `<DEL>` or `<DUP:TANDEM>`
pub fn is_symbolic(allele: &str) -> bool {
    allele.len() > 2 && allele.starts_with('<') && allele.ends_with('>')
}

/// Fold bounds into a symbolic allele: `ALT|end` or `ALT|end|l:r|l:r`
pub fn fold_symbolic_alternate(alternate: &str, bounds: &StructuralBounds) -> String {
    let mut folded = format!("{}{}{}", alternate, SYMBOLIC_SEPARATOR, bounds.end);
    if bounds.ci_start.is_some() || bounds.ci_end.is_some() {
        for ci in [bounds.ci_start, bounds.ci_end] {
            folded.push(SYMBOLIC_SEPARATOR);
            if let Some((left, right)) = ci {
                folded.push_str(&format!("{}:{}", left, right));
            }
        }
    }
    folded
}

/// Split a key alternate back into the allele and its structural bounds.
///
/// Alternates that are not folded symbolic alleles are returned untouched.
pub fn split_symbolic_alternate(alternate: &str) -> CodecResult<(String, Option<StructuralBounds>)> {
    if !alternate.starts_with('<') {
        return Ok((alternate.to_string(), None));
    }
    let close = match alternate.find('>') {
        Some(idx) => idx,
        None => return Ok((alternate.to_string(), None)),
    };
    let (allele, rest) = alternate.split_at(close + 1);
    if rest.is_empty() {
        return Ok((allele.to_string(), None));
    }

    let malformed = || CodecError::MalformedKey(format!("bad symbolic alternate {}", alternate));
    let parts: Vec<&str> = rest[1..].split(SYMBOLIC_SEPARATOR).collect();
    if !rest.starts_with(SYMBOLIC_SEPARATOR) || !(parts.len() == 1 || parts.len() == 3) {
        return Err(malformed());
    }

    let end = parts[0].parse::<u32>().map_err(|_| malformed())?;
    let mut bounds = StructuralBounds::new(end);
    if parts.len() == 3 {
        bounds.ci_start = parse_interval(parts[1]).ok_or_else(malformed)?;
        bounds.ci_end = parse_interval(parts[2]).ok_or_else(malformed)?;
    }
    Ok((allele.to_string(), Some(bounds)))
}

/// `""` is an absent interval; `l:r` a present one
fn parse_interval(s: &str) -> Option<Option<(u32, u32)>> {
    if s.is_empty() {
        return Some(None);
    }
    let (left, right) = s.split_once(':')?;
    Some(Some((left.parse().ok()?, right.parse().ok()?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_simple_types() {
        assert_eq!(VariantType::infer("A", "C"), VariantType::Snv);
        assert_eq!(VariantType::infer("AC", "GT"), VariantType::Mnv);
        assert_eq!(VariantType::infer("", "T"), VariantType::Insertion);
        assert_eq!(VariantType::infer("T", ""), VariantType::Deletion);
        assert_eq!(VariantType::infer("A", "ACGT"), VariantType::Indel);
        assert_eq!(VariantType::infer("A", "."), VariantType::NoVariation);
    }

    #[test]
    fn test_infer_symbolic_types() {
        assert_eq!(VariantType::infer("N", "<DEL>"), VariantType::Deletion);
        assert_eq!(VariantType::infer("N", "<DUP:TANDEM>"), VariantType::Duplication);
        assert_eq!(VariantType::infer("N", "<INV>"), VariantType::Inversion);
        assert_eq!(VariantType::infer("N", "<CNV>"), VariantType::Cnv);
        assert_eq!(VariantType::infer("N", "<INS>"), VariantType::Insertion);
        assert_eq!(VariantType::infer("N", "<NON_REF>"), VariantType::Symbolic);
        assert_eq!(VariantType::infer("G", "G]17:198982]"), VariantType::Breakend);
    }

    #[test]
    fn test_type_names_parse_back() {
        for t in [VariantType::Snv, VariantType::NoVariation, VariantType::Breakend] {
            assert_eq!(t.as_str().parse::<VariantType>().unwrap(), t);
        }
        assert!("FOO".parse::<VariantType>().is_err());
    }

    #[test]
    fn test_fold_end_only() {
        let folded = fold_symbolic_alternate("<DEL>", &StructuralBounds::new(1500));
        assert_eq!(folded, "<DEL>|1500");
        let (allele, bounds) = split_symbolic_alternate(&folded).unwrap();
        assert_eq!(allele, "<DEL>");
        assert_eq!(bounds, Some(StructuralBounds::new(1500)));
    }

    #[test]
    fn test_fold_with_confidence_intervals() {
        let bounds = StructuralBounds::new(2000)
            .with_ci_start(990, 1010)
            .with_ci_end(1990, 2010);
        let folded = fold_symbolic_alternate("<DUP>", &bounds);
        assert_eq!(folded, "<DUP>|2000|990:1010|1990:2010");
        assert_eq!(split_symbolic_alternate(&folded).unwrap().1, Some(bounds));
    }

    #[test]
    fn test_fold_with_one_interval() {
        let bounds = StructuralBounds::new(2000).with_ci_end(1990, 2010);
        let folded = fold_symbolic_alternate("<DUP>", &bounds);
        assert_eq!(folded, "<DUP>|2000||1990:2010");
        assert_eq!(split_symbolic_alternate(&folded).unwrap().1, Some(bounds));
    }

    #[test]
    fn test_split_plain_alleles_untouched() {
        assert_eq!(split_symbolic_alternate("ACGT").unwrap(), ("ACGT".to_string(), None));
        assert_eq!(split_symbolic_alternate("<DEL>").unwrap(), ("<DEL>".to_string(), None));
    }

    #[test]
    fn test_split_rejects_garbage() {
        assert!(split_symbolic_alternate("<DEL>|abc").is_err());
        assert!(split_symbolic_alternate("<DEL>|10|1:2").is_err());
        assert!(split_symbolic_alternate("<DEL>x").is_err());
    }

    #[test]
    fn test_bounds_ignored_for_plain_alternate() {
        let coords = VariantCoordinates::new("1", 100, "A", "C").with_bounds(StructuralBounds::new(5));
        assert_eq!(coords.key_alternate(), "C");
    }
}
