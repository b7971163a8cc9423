/// ELF hash of the joint name with ASCII letters lowercased, as the
/// consuming engine keys joints by it. Other bytes hash unchanged.
pub fn joint_hash(name: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in name.bytes().map(|byte| byte.to_ascii_lowercase()) {
        hash = (hash << 4).wrapping_add(u32::from(byte));
        let high = hash & 0xF000_0000;
        if high != 0 {
            hash ^= high >> 24;
        }
        hash &= !high;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_empty_name_when_hashing_then_zero_is_returned() {
        assert_eq!(joint_hash(""), 0);
    }

    #[test]
    fn given_short_name_when_hashing_then_value_matches_manual_fold() {
        // ('a' << 4) + 'b'
        assert_eq!(joint_hash("ab"), 0x61 * 16 + 0x62);
    }

    #[test]
    fn given_mixed_case_names_when_hashing_then_case_is_ignored() {
        assert_eq!(joint_hash("L_UpperArm"), joint_hash("l_upperarm"));
    }

    #[test]
    fn given_non_ascii_name_when_hashing_then_utf8_bytes_are_hashed_unchanged() {
        // "Ä" is 0xC3 0x84; only ASCII letters are folded.
        assert_eq!(joint_hash("Ä"), 0xC3 * 16 + 0x84);
        assert_ne!(joint_hash("Ä"), joint_hash("ä"));
    }

    #[test]
    fn given_long_name_when_hashing_then_top_nibble_stays_clear() {
        let hash = joint_hash("Armature_Root_Spine_Chest_Neck_Head_Jaw");
        assert_eq!(hash & 0xF000_0000, 0);
        assert_ne!(hash, 0);
    }
}
