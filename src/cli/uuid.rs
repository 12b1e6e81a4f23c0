use gptkit::Guid;
use rand::Rng;

/// A random (version 4, RFC 4122 variant) GUID.
pub fn generate_random_guid() -> Guid {
    let mut bytes: [u8; 16] = rand::thread_rng().gen();
    // the version lives in the high nibble of the third group, stored little-endian
    bytes[7] = (bytes[7] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Guid::from_bytes(bytes)
}
