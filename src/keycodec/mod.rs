//! Row-key codec
//!
//! Maps `(chromosome, position, reference, alternate)` to byte keys that sort
//! by canonical chromosome, then numerically by position.
//!
//! # Example
//!
//! ```ignore
//! let codec = KeyCodec::default();
//! let encoded = codec.encode(&VariantCoordinates::new("chr1", 1000, "A", "C"))?;
//! let decoded = codec.decode(&encoded.key, encoded.auxiliary.as_ref())?;
//! ```

mod chromosome;
mod codec;
mod errors;
mod variant;

pub use chromosome::canonical_chromosome;
pub use codec::{
    java_hash, AuxiliaryAlleles, DecodedKey, EncodedKey, KeyCodec, DEFAULT_MAX_ROW_LENGTH,
    HASH_MARKER, KEY_SEPARATOR,
};
pub use errors::{CodecError, CodecResult};
pub use variant::{
    fold_symbolic_alternate, is_symbolic, split_symbolic_alternate, StructuralBounds,
    VariantCoordinates, VariantType,
};
