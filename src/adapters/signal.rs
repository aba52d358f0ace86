//! Signal delivery to stage processes.

/// Send SIGINT to every process in the group led by `pid`
pub fn interrupt_group(pid: u32) -> std::io::Result<()> {
    send(pid, Signal::Interrupt, true)
}

/// Send SIGKILL to `pid`, or to its whole process group when `group` is set
pub fn kill(pid: u32, group: bool) -> std::io::Result<()> {
    send(pid, Signal::Kill, group)
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Interrupt,
    Kill,
}

#[cfg(unix)]
fn send(pid: u32, signal: Signal, group: bool) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;

    let signal = match signal {
        Signal::Interrupt => libc::SIGINT,
        Signal::Kill => libc::SIGKILL,
    };

    // SAFETY: kill and killpg have no memory-safety preconditions
    let result = unsafe {
        if group {
            libc::killpg(pid, signal)
        } else {
            libc::kill(pid, signal)
        }
    };

    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send(_pid: u32, signal: Signal, _group: bool) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("{:?} signals are only supported on unix", signal),
    ))
}
