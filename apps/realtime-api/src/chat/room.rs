//! Deterministic direct-message room identifiers.
//!
//! A room is not stored anywhere. It is recomputed per operation from the
//! participant pair so both sides derive the same relay scope.

/// Room id for a pair of users: the two ids sorted and joined.
pub fn direct_room_id(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("dm:{lo}:{hi}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_symmetric() {
        assert_eq!(direct_room_id("usr_a", "usr_b"), direct_room_id("usr_b", "usr_a"));
    }

    #[test]
    fn sorts_participants() {
        assert_eq!(direct_room_id("usr_b", "usr_a"), "dm:usr_a:usr_b");
    }

    #[test]
    fn distinct_pairs_get_distinct_rooms() {
        assert_ne!(direct_room_id("usr_a", "usr_b"), direct_room_id("usr_a", "usr_c"));
    }

    #[test]
    fn self_pair_is_stable() {
        assert_eq!(direct_room_id("usr_a", "usr_a"), "dm:usr_a:usr_a");
    }
}
