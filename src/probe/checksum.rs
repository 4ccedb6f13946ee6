/// Internet checksum (RFC 1071) over an arbitrary byte buffer
///
/// The buffer is summed as big-endian 16-bit words. An odd trailing byte is
/// the high byte of a final word whose low byte is zero. Carries are folded
/// back into the low 16 bits until none remain, and the one's complement of
/// the result is returned.
pub fn checksum(data: &[u8]) -> u16 {
    !fold(sum_words(data))
}

/// Sum big-endian 16-bit words into a wide accumulator
fn sum_words(data: &[u8]) -> u64 {
    let mut sum: u64 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u64;
    }

    // Odd tail pads with a zero low byte
    if let [last] = chunks.remainder() {
        sum += (*last as u64) << 8;
    }

    sum
}

/// Fold carries out of bits 16+ until the sum fits in 16 bits
fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// True if a packet carrying its checksum sums to all ones
pub fn verify_checksum(data: &[u8]) -> bool {
    fold(sum_words(data)) == 0xFFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        // Sum of nothing is zero, complement is all ones
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_checksum_rfc1071_example() {
        // Example from RFC 1071 section 3: sum is 0xDDF2
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(checksum(&data), !0xDDF2);
    }

    #[test]
    fn test_checksum_odd_length_pads_low_byte() {
        assert_eq!(checksum(&[0xAB]), !0xAB00);
        assert_eq!(checksum(&[0x12, 0x34, 0x56]), !(0x1234u16 + 0x5600));
    }

    #[test]
    fn test_checksum_folds_repeated_carries() {
        // 0xFFFF * 3 = 0x2FFFD -> 0xFFFF after folding
        let data = [0xFF; 6];
        assert_eq!(checksum(&data), 0x0000);
    }

    #[test]
    fn test_checksum_matches_pnet() {
        let data: Vec<u8> = (0u8..=40).collect();
        let mut zeroed = data.clone();
        zeroed[2] = 0;
        zeroed[3] = 0;
        // pnet skips word 1 (the ICMP checksum field)
        assert_eq!(checksum(&zeroed), pnet::packet::util::checksum(&data, 1));
    }

    #[test]
    fn test_verify_checksum_self_validates() {
        let mut data = vec![8, 0, 0, 0, 0x12, 0x34, 0x00, 0x07, b'p', b'i', b'n'];
        let cksum = checksum(&data);
        data[2..4].copy_from_slice(&cksum.to_be_bytes());

        assert!(verify_checksum(&data));
        assert_eq!(checksum(&data), 0);

        data[5] ^= 0x01;
        assert!(!verify_checksum(&data));
    }
}
