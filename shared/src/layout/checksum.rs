use crc32fast::Hasher;

/// CRC-32 (IEEE) over `bytes`, continuing from `seed`.
pub fn crc32(bytes: &[u8], seed: u32) -> u32 {
    let mut hasher = Hasher::new_with_initial(seed);
    hasher.update(bytes);
    hasher.finalize()
}

/// Identifies a property by lowercase name, type name and static array index,
/// chained from the checksum of the enclosing struct or array.
pub fn compatible_checksum(name: &str, type_name: &str, static_index: u32, parent: u32) -> u32 {
    let checksum = crc32(name.to_lowercase().as_bytes(), parent);
    let checksum = crc32(type_name.to_lowercase().as_bytes(), checksum);
    let checksum = crc32(&static_index.to_le_bytes(), checksum);
    // zero marks "no checksum"
    if checksum == 0 {
        1
    } else {
        checksum
    }
}
