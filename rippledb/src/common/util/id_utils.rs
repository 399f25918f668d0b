use rand::Rng;
use std::fmt::Write;

/// Length of generated object ids, in hex characters.
pub const OBJECT_ID_LENGTH: usize = 24;

/// Generates a random object id: a 24 character lowercase hex token.
///
/// Collisions are astronomically unlikely, which is what primary key
/// generation relies on.
pub fn new_object_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; OBJECT_ID_LENGTH / 2] = rng.gen();
    to_hex(&bytes)
}

/// Derives a stable object id from a string, so the same input always maps
/// to the same id.
pub fn object_id_from(source: &str) -> String {
    let uuid = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, source.as_bytes());
    let simple = uuid.simple().to_string();
    simple[..OBJECT_ID_LENGTH].to_string()
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // writing into a String cannot fail
        let _ = write!(out, "{:02x}", b);
    }
    out
}
