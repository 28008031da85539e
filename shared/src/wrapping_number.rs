/// Sequence numbers used by reliable attachments wrap at `u16::MAX`.
pub type SequenceNumber = u16;

/// Whether `s1` comes after `s2`, treating the space as a ring where the
/// closer half is "ahead".
/// sequence_greater_than(2, 1) is true
/// sequence_greater_than(0, 65535) is true
/// sequence_greater_than(1, 1) is false
pub fn sequence_greater_than(s1: SequenceNumber, s2: SequenceNumber) -> bool {
    let distance = s1.wrapping_sub(s2);
    distance != 0 && distance <= 32768
}

pub fn sequence_less_than(s1: SequenceNumber, s2: SequenceNumber) -> bool {
    sequence_greater_than(s2, s1)
}
