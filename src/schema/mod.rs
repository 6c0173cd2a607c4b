pub mod arrow;
pub mod synonyms;
pub mod table;
pub mod types;

pub use self::arrow::{canonical_field, canonical_type, date_type};
pub use synonyms::{SynonymGroup, SynonymTable};
pub use table::{CanonicalTable, NormalizeReport};
