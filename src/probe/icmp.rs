use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::ipv4::Ipv4Packet;

use crate::error::DecodeError;
use crate::probe::checksum::checksum;

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
/// Fixed payload carried by every Echo Request
pub const PAYLOAD: &[u8; PAYLOAD_SIZE] = b"abcdefghijklmnopqrstuvwabcdefghi";
/// Payload size in bytes
pub const PAYLOAD_SIZE: usize = 32;
/// Smallest legal IPv4 header (IHL = 5)
const MIN_IPV4_HEADER_SIZE: usize = 20;

// ICMP (RFC 792) and ICMPv6 (RFC 4443) echo types
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMPV6_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_ECHO_REPLY: u8 = 129;

/// Echo Request type for the address family
pub fn echo_request_type(ipv6: bool) -> u8 {
    if ipv6 { ICMPV6_ECHO_REQUEST } else { ICMP_ECHO_REQUEST }
}

/// Echo Reply type for the address family
pub fn echo_reply_type(ipv6: bool) -> u8 {
    if ipv6 { ICMPV6_ECHO_REPLY } else { ICMP_ECHO_REPLY }
}

/// Get process identifier for ICMP identification field
pub fn get_identifier() -> u16 {
    std::process::id() as u16
}

/// Parsed ICMP header of an inbound datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    /// TTL from the enclosing IPv4 header (None for ICMPv6)
    pub ttl: Option<u8>,
    /// Size of the ICMP message (header + payload)
    pub size: usize,
}

/// Build an ICMP or ICMPv6 Echo Request
///
/// Layout (big-endian): type, code, checksum, identifier, sequence, then the
/// 32-byte payload. The checksum is computed with the field zeroed and then
/// written back, so the returned packet always validates.
///
/// For ICMPv6 the kernel recomputes the checksum over the pseudo-header on
/// raw sockets; the value embedded here is still consistent with the bytes.
pub fn encode(ipv6: bool, identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(ICMP_HEADER_SIZE + PAYLOAD_SIZE);
    packet.push(echo_request_type(ipv6));
    packet.push(0); // code
    packet.extend_from_slice(&[0, 0]); // checksum placeholder
    packet.extend_from_slice(&identifier.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(PAYLOAD);

    let cksum = checksum(&packet);
    packet[2..4].copy_from_slice(&cksum.to_be_bytes());
    packet
}

/// Parse an inbound datagram into its ICMP header fields
///
/// Raw IPv4 sockets deliver the IP header in front of the ICMP message; its
/// length is the IHL nibble times four. Raw IPv6 sockets deliver the ICMPv6
/// message directly.
pub fn decode(data: &[u8], ipv6: bool) -> Result<EchoReply, DecodeError> {
    let (offset, ttl) = if ipv6 {
        (0, None)
    } else {
        let ip = Ipv4Packet::new(data).ok_or(DecodeError::Truncated {
            needed: MIN_IPV4_HEADER_SIZE,
            actual: data.len(),
        })?;
        let ihl = ip.get_header_length();
        let header_len = ihl as usize * 4;
        if header_len < MIN_IPV4_HEADER_SIZE {
            return Err(DecodeError::BadHeaderLength(ihl));
        }
        (header_len, Some(ip.get_ttl()))
    };

    let needed = offset + ICMP_HEADER_SIZE;
    if data.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            actual: data.len(),
        });
    }

    let icmp = EchoReplyPacket::new(&data[offset..]).ok_or(DecodeError::Truncated {
        needed,
        actual: data.len(),
    })?;

    Ok(EchoReply {
        icmp_type: icmp.get_icmp_type().0,
        code: icmp.get_icmp_code().0,
        checksum: icmp.get_checksum(),
        identifier: icmp.get_identifier(),
        sequence: icmp.get_sequence_number(),
        ttl,
        size: data.len() - offset,
    })
}

/// Check that a reply answers our request
///
/// Everything a raw socket hears that is not an echo reply of the right
/// family carrying our identifier and sequence is rejected.
pub fn matches(reply: &EchoReply, identifier: u16, sequence: u16, ipv6: bool) -> bool {
    reply.icmp_type == echo_reply_type(ipv6)
        && reply.identifier == identifier
        && reply.sequence == sequence
}
