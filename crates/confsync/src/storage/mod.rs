pub mod writer;
pub mod xlsx;

pub use writer::{validate_component, ArtifactWriter};
pub use xlsx::{decode_table, encode_table};
