use std::net::SocketAddr;

/// How remote addresses get display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// Reverse DNS through the system resolver.
    System,

    /// No lookups; callers fall back to the IP literal. Keeps tests
    /// hermetic.
    Literal,
}

impl Resolver {
    /// Name for `addr`, or `None` when resolution fails or is disabled.
    pub fn reverse_lookup(&self, addr: &SocketAddr) -> Option<String> {
        match self {
            Resolver::Literal => None,
            Resolver::System => reverse_dns(addr),
        }
    }
}

#[cfg(unix)]
fn reverse_dns(addr: &SocketAddr) -> Option<String> {
    use std::ffi::CStr;
    use std::os::raw::c_char;

    let sockaddr = socket2::SockAddr::from(*addr);
    let mut host = [0 as c_char; libc::NI_MAXHOST as usize];

    // SAFETY: sockaddr points at a valid sockaddr of the stated length
    // and the host buffer outlives the call.
    let rc = unsafe {
        libc::getnameinfo(
            sockaddr.as_ptr().cast::<libc::sockaddr>(),
            sockaddr.len(),
            host.as_mut_ptr(),
            host.len() as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            libc::NI_NAMEREQD,
        )
    };

    if rc != 0 {
        return None;
    }

    // SAFETY: on success getnameinfo wrote a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(host.as_ptr()) };
    name.to_str().ok().map(|s| s.to_string())
}

#[cfg(not(unix))]
fn reverse_dns(_addr: &SocketAddr) -> Option<String> {
    None
}

/// This agent's own hostname, as announced in outbound messages.
/// Falls back to "localhost" when the system will not say.
#[cfg(unix)]
pub fn local_hostname() -> String {
    use std::ffi::CStr;
    use std::os::raw::c_char;

    let mut buf = [0 as c_char; 256];

    // SAFETY: buf is writable for its full length; the explicit
    // terminator below covers a truncated result.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len() - 1) };
    buf[buf.len() - 1] = 0;

    if rc == 0 {
        // SAFETY: buf is NUL-terminated.
        let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
        if let Ok(name) = name.to_str() {
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    "localhost".to_string()
}

#[cfg(not(unix))]
pub fn local_hostname() -> String {
    "localhost".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_resolver_never_resolves() {
        let addr: SocketAddr = "10.0.0.1:8649".parse().unwrap();
        assert_eq!(Resolver::Literal.reverse_lookup(&addr), None);
    }

    #[test]
    fn system_resolver_returns_nonempty_or_nothing() {
        let addr: SocketAddr = "127.0.0.1:8649".parse().unwrap();
        if let Some(name) = Resolver::System.reverse_lookup(&addr) {
            assert!(!name.is_empty());
        }
    }

    #[test]
    fn local_hostname_is_never_empty() {
        assert!(!local_hostname().is_empty());
    }
}
