use glam::{IVec3, Vec3};

/// Round each axis to the nearest integer. Out-of-range values saturate to
/// the `i32` bounds and NaN maps to 0.
pub fn quantize(v: Vec3) -> IVec3 {
    IVec3::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
}

/// Obscure a position by XOR-ing each rounded axis with the rounded key.
///
/// This hides coordinates from casual inspection; it is not encryption.
pub fn encode(position: Vec3, key: Vec3) -> IVec3 {
    quantize(position) ^ quantize(key)
}

/// Undo [`encode`] under the same key. XOR is its own inverse, so this is
/// the same mixing step applied to an encoded position.
pub fn decode(encoded: IVec3, key: Vec3) -> IVec3 {
    encoded ^ quantize(key)
}

/// Mix two cell ids into an opaque tag by XOR-ing character codes.
///
/// The shorter id is padded with NUL; trailing NULs are trimmed from the
/// result. Lossy and one-way, and the result may contain control
/// characters, so never display it.
pub fn combine_cell_id(a: &str, b: &str) -> String {
    let mut left = a.chars();
    let mut right = b.chars();
    let mut mixed = String::with_capacity(a.len().max(b.len()));
    loop {
        let (l, r) = match (left.next(), right.next()) {
            (None, None) => break,
            (l, r) => (l.map_or(0, u32::from), r.map_or(0, u32::from)),
        };
        mixed.push(char::from_u32(l ^ r).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    let trimmed = mixed.trim_end_matches('\0').len();
    mixed.truncate(trimmed);
    mixed
}
