pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{read_object, seeded_bytes, sha256_hash};
