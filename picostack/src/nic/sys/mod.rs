//! Linux packet sockets.
#![allow(unsafe_code)]
use core::fmt;
use std::io;

mod raw_socket;

pub use self::raw_socket::RawSocket;

/// The `errno` of a failed libc call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub libc::c_int);

impl Errno {
    /// Read the errno of the calling thread.
    pub fn new() -> Errno {
        Errno(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        io::Error::from_raw_os_error(self.0).fmt(f)
    }
}

impl From<Errno> for io::Error {
    fn from(err: Errno) -> io::Error {
        io::Error::from_raw_os_error(err.0)
    }
}

/// Turn the `-1` failure return of a libc call into the errno.
fn cvt<T: From<i8> + PartialEq>(ret: T) -> Result<T, Errno> {
    if ret == T::from(-1) {
        Err(Errno::new())
    } else {
        Ok(ret)
    }
}

/// The kernel `struct ifreq`: an interface name and a request specific union.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct IfReq {
    name: [libc::c_char; libc::IF_NAMESIZE],
    data: [u8; 24],
}

impl IfReq {
    /// Longer names are cut, the last octet stays zero.
    fn new(interface: &str) -> Self {
        let mut name = [0; libc::IF_NAMESIZE];
        for (slot, &byte) in name[..libc::IF_NAMESIZE - 1].iter_mut().zip(interface.as_bytes()) {
            *slot = byte as libc::c_char;
        }
        IfReq { name, data: [0; 24] }
    }

    /// Run an interface ioctl on `fd` and return the union the kernel filled in.
    fn ioctl(&self, fd: libc::c_int, request: libc::Ioctl) -> Result<[u8; 24], Errno> {
        let mut req = *self;
        cvt(unsafe { libc::ioctl(fd, request, &mut req as *mut IfReq) })?;
        Ok(req.data)
    }
}
