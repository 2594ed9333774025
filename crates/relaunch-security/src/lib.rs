mod digest;

pub use digest::{sha256_file_hex, sha256_hex, verify_same_contents};
