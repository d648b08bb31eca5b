use core::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use super::{cvt, Errno, IfReq};

use crate::config::MAX_FRAME_LEN;
use crate::layer::{Error, Result};
use crate::nic::Device;
use crate::wire::EthernetAddress;

/// Every protocol, in network order for `socket` and `bind`.
const ETH_P_ALL: u16 = (libc::ETH_P_ALL as u16).to_be();

const SIOCGIFFLAGS: libc::Ioctl = 0x8913;
const SIOCGIFHWADDR: libc::Ioctl = 0x8927;
const SIOCGIFINDEX: libc::Ioctl = 0x8933;

/// A non-blocking `AF_PACKET` socket bound to one interface.
///
/// Answering [`is_frame_available`] reads one frame ahead, the next [`receive_frame`] hands it
/// out. Failed calls report `Error::Device`, the errno behind it is kept for [`last_err`].
///
/// [`is_frame_available`]: ../trait.Device.html#tymethod.is_frame_available
/// [`receive_frame`]: ../trait.Device.html#tymethod.receive_frame
/// [`last_err`]: #method.last_err
#[derive(Debug)]
pub struct RawSocket {
    fd: libc::c_int,
    interface: IfReq,
    mac: EthernetAddress,
    buffer: [u8; MAX_FRAME_LEN],
    /// Length of the frame read ahead into `buffer`.
    buffered: Option<usize>,
    last_err: Option<Errno>,
}

impl RawSocket {
    /// Open a socket on the named interface and read its hardware address.
    ///
    /// Needs `CAP_NET_RAW`.
    pub fn new(name: &str) -> core::result::Result<Self, Errno> {
        let fd = cvt(unsafe {
            libc::socket(libc::AF_PACKET, libc::SOCK_RAW | libc::SOCK_NONBLOCK, i32::from(ETH_P_ALL))
        })?;

        // From here on the descriptor is closed on drop.
        let mut socket = RawSocket {
            fd,
            interface: IfReq::new(name),
            mac: EthernetAddress::default(),
            buffer: [0; MAX_FRAME_LEN],
            buffered: None,
            last_err: None,
        };
        socket.bind()?;

        // A `struct sockaddr`, two octets of family before the address.
        let hwaddr = socket.interface.ioctl(fd, SIOCGIFHWADDR)?;
        socket.mac = EthernetAddress::from_bytes(&hwaddr[2..8]);
        Ok(socket)
    }

    fn bind(&mut self) -> core::result::Result<(), Errno> {
        let index = self.interface.ioctl(self.fd, SIOCGIFINDEX)?;
        let sockaddr = libc::sockaddr_ll {
            sll_family: libc::AF_PACKET as u16,
            sll_protocol: ETH_P_ALL,
            sll_ifindex: libc::c_int::from_ne_bytes([index[0], index[1], index[2], index[3]]),
            sll_hatype: 0,
            sll_pkttype: 0,
            sll_halen: 0,
            sll_addr: [0; 8],
        };

        cvt(unsafe {
            libc::bind(
                self.fd,
                &sockaddr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t)
        })?;
        Ok(())
    }

    /// Take the errno of the last failed call.
    pub fn last_err(&mut self) -> Option<Errno> {
        self.last_err.take()
    }

    /// Read ahead one frame unless one is buffered already.
    fn fill(&mut self) -> Result<Option<usize>> {
        if self.buffered.is_some() {
            return Ok(self.buffered);
        }

        let len = unsafe {
            libc::recv(self.fd, self.buffer.as_mut_ptr() as *mut libc::c_void, self.buffer.len(), 0)
        };
        match cvt(len) {
            Ok(len) => self.buffered = Some(len as usize),
            Err(Errno(libc::EAGAIN)) => (),
            Err(err) => return Err(self.store_err(err)),
        }
        Ok(self.buffered)
    }

    fn store_err(&mut self, err: Errno) -> Error {
        self.last_err = Some(err);
        Error::Device
    }
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd); }
    }
}

impl Device for RawSocket {
    fn is_frame_available(&mut self) -> bool {
        matches!(self.fill(), Ok(Some(_)))
    }

    fn receive_frame(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let len = match self.fill()? {
            Some(len) => len,
            None => return Ok(0),
        };

        self.buffered = None;
        let target = buffer.get_mut(..len).ok_or(Error::BadSize)?;
        target.copy_from_slice(&self.buffer[..len]);
        Ok(len)
    }

    fn transmit_frame(&mut self, frame: &[u8]) -> Result<()> {
        let sent = unsafe {
            libc::send(self.fd, frame.as_ptr() as *const libc::c_void, frame.len(), 0)
        };
        match cvt(sent) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.store_err(err)),
        }
    }

    fn local_mac_address(&self) -> EthernetAddress {
        self.mac
    }

    /// Up and running, as `ip link` shows it.
    fn is_link_up(&mut self) -> bool {
        let flags = match self.interface.ioctl(self.fd, SIOCGIFFLAGS) {
            Ok(data) => libc::c_int::from(i16::from_ne_bytes([data[0], data[1]])) & 0xffff,
            Err(err) => {
                self.store_err(err);
                return false;
            },
        };
        let wanted = libc::IFF_UP | libc::IFF_RUNNING;
        flags & wanted == wanted
    }
}
