use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, warn};

/// Shortest read timeout handed to the kernel
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Result of receiving one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvResult {
    pub len: usize,
    pub source: IpAddr,
    /// Hop limit from ancillary data (IPv6 only; IPv4 carries TTL in the header)
    pub hop_limit: Option<u8>,
}

/// A bidirectional ICMP endpoint for one address family
///
/// Dropping the channel releases the underlying socket.
pub trait IcmpChannel {
    /// Send an ICMP message to `target`
    fn send_to(&mut self, packet: &[u8], target: IpAddr) -> io::Result<usize>;

    /// Receive the next datagram, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    fn recv_from(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<Option<RecvResult>>;
}

/// Opens ICMP channels for a family
pub trait ChannelFactory {
    type Channel: IcmpChannel;

    /// Open a channel; `ttl` is applied as IP TTL or IPv6 unicast hop limit
    fn open(&self, ipv6: bool, ttl: u8) -> io::Result<Self::Channel>;
}

/// Opens privileged raw sockets
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSocketFactory;

impl ChannelFactory for RawSocketFactory {
    type Channel = RawChannel;

    fn open(&self, ipv6: bool, ttl: u8) -> io::Result<RawChannel> {
        RawChannel::open(ipv6, ttl)
    }
}

/// Raw ICMP/ICMPv6 socket
#[derive(Debug)]
pub struct RawChannel {
    socket: Socket,
    ipv6: bool,
}

impl RawChannel {
    pub fn open(ipv6: bool, ttl: u8) -> io::Result<Self> {
        let socket = create_raw_icmp_socket(ipv6)?;

        if let Err(e) = set_ttl(&socket, ttl, ipv6) {
            warn!("Could not set {} to {}: {}", ttl_option_name(ipv6), ttl, e);
        }

        if ipv6 && let Err(e) = enable_recv_hoplimit(&socket) {
            debug!("Could not enable hop limit reception: {}", e);
        }

        Ok(Self { socket, ipv6 })
    }
}

impl IcmpChannel for RawChannel {
    fn send_to(&mut self, packet: &[u8], target: IpAddr) -> io::Result<usize> {
        send_icmp(&self.socket, packet, target)
    }

    fn recv_from(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<Option<RecvResult>> {
        if wait.is_zero() {
            return Ok(None);
        }
        // A timeval that rounds to zero would mean "block forever"
        self.socket.set_read_timeout(Some(wait.max(MIN_READ_TIMEOUT)))?;

        match recv_icmp_with_hoplimit(&self.socket, buffer, self.ipv6) {
            Ok(result) => Ok(Some(result)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn ttl_option_name(ipv6: bool) -> &'static str {
    if ipv6 { "IPV6_UNICAST_HOPS" } else { "IP_TTL" }
}

/// Create a blocking raw ICMP socket
pub fn create_raw_icmp_socket(ipv6: bool) -> io::Result<Socket> {
    let domain = if ipv6 { Domain::IPV6 } else { Domain::IPV4 };
    let protocol = if ipv6 {
        Protocol::ICMPV6
    } else {
        Protocol::ICMPV4
    };

    let socket = Socket::new(domain, Type::RAW, Some(protocol))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Set TTL (IPv4) or unicast hop limit (IPv6) for outgoing packets
pub fn set_ttl(socket: &Socket, ttl: u8, ipv6: bool) -> io::Result<()> {
    if ipv6 {
        socket.set_unicast_hops_v6(ttl as u32)
    } else {
        socket.set_ttl(ttl as u32)
    }
}

/// Send ICMP packet to target
pub fn send_icmp(socket: &Socket, packet: &[u8], target: IpAddr) -> io::Result<usize> {
    let addr = SockAddr::from(SocketAddr::new(target, 0));
    socket.send_to(packet, &addr)
}

/// Enable IPV6_RECVHOPLIMIT so recvmsg() reports the reply's hop limit
#[cfg(unix)]
pub fn enable_recv_hoplimit(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let val: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IPV6,
            libc::IPV6_RECVHOPLIMIT,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of_val(&val) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Receive one datagram along with its source and (IPv6) hop limit
#[cfg(unix)]
pub fn recv_icmp_with_hoplimit(
    socket: &Socket,
    buffer: &mut [u8],
    ipv6: bool,
) -> io::Result<RecvResult> {
    use std::os::unix::io::AsRawFd;

    let mut iov = libc::iovec {
        iov_base: buffer.as_mut_ptr() as *mut libc::c_void,
        iov_len: buffer.len(),
    };

    // u64 elements keep the control buffer aligned for cmsghdr
    let mut cmsg_buf = [0u64; 8];
    let mut src_storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };

    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_name = &mut src_storage as *mut _ as *mut libc::c_void;
    msg.msg_namelen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    // msg_controllen type differs: usize on Linux, u32 on macOS
    msg.msg_controllen = std::mem::size_of_val(&cmsg_buf) as _;

    let len = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, 0) };
    if len < 0 {
        return Err(io::Error::last_os_error());
    }

    let source = parse_sockaddr_storage(&src_storage)?;
    let hop_limit = if ipv6 { extract_hoplimit(&msg) } else { None };

    Ok(RecvResult {
        len: len as usize,
        source,
        hop_limit,
    })
}

/// Extract IPV6_HOPLIMIT from control messages
#[cfg(unix)]
fn extract_hoplimit(msg: &libc::msghdr) -> Option<u8> {
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(msg);
        while !cmsg.is_null() {
            let hdr = &*cmsg;
            if hdr.cmsg_level == libc::IPPROTO_IPV6 && hdr.cmsg_type == libc::IPV6_HOPLIMIT {
                let data_ptr = libc::CMSG_DATA(cmsg);
                let hops = std::ptr::read_unaligned(data_ptr as *const libc::c_int);
                return u8::try_from(hops).ok();
            }
            cmsg = libc::CMSG_NXTHDR(msg, cmsg);
        }
    }
    None
}

/// Parse sockaddr_storage to IpAddr
#[cfg(unix)]
fn parse_sockaddr_storage(storage: &libc::sockaddr_storage) -> io::Result<IpAddr> {
    match storage.ss_family as libc::c_int {
        libc::AF_INET => {
            let addr: &libc::sockaddr_in = unsafe { &*(storage as *const _ as *const _) };
            let ip = std::net::Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            Ok(IpAddr::V4(ip))
        }
        libc::AF_INET6 => {
            let addr: &libc::sockaddr_in6 = unsafe { &*(storage as *const _ as *const _) };
            let ip = std::net::Ipv6Addr::from(addr.sin6_addr.s6_addr);
            Ok(IpAddr::V6(ip))
        }
        family => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Unknown address family: {}", family),
        )),
    }
}
