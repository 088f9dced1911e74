#![allow(unsafe_code)]

use super::OpenMode;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use std::fs::File;
use std::io;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Duplicate an inherited descriptor after checking it is open in the right direction.
///
/// The conduit's descriptor stays open; the returned file owns a fresh
/// close-on-exec duplicate sharing the same offset.
pub(super) fn open_descriptor(fd: RawFd, mode: OpenMode) -> io::Result<File> {
    // EBADF here means the descriptor was never inherited or is already closed.
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    let access = flags & OFlag::O_ACCMODE;
    let allowed = match mode {
        OpenMode::Read => access == OFlag::O_RDONLY || access == OFlag::O_RDWR,
        OpenMode::Write => access == OFlag::O_WRONLY || access == OFlag::O_RDWR,
    };
    if !allowed {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("descriptor {fd} is not open for {mode}"),
        ));
    }

    let dup = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(0))?;
    // SAFETY: dup was just returned by F_DUPFD_CLOEXEC and nothing else refers to it.
    Ok(unsafe { File::from_raw_fd(dup) })
}

/// Keep `fds` open across exec in the spawned child.
///
/// Files opened by std carry `FD_CLOEXEC`; the flag is cleared in the child
/// only, so the coordinator's own descriptors stay close-on-exec.
pub(super) fn keep_descriptors_on_exec(command: &mut Command, fds: Vec<RawFd>) {
    // SAFETY: pre_exec runs after fork, before exec. The closure only issues
    // fcntl syscalls over a vector allocated in the parent; no allocation or
    // locking happens in the child.
    unsafe {
        command.pre_exec(move || {
            for &fd in &fds {
                clear_cloexec(fd)?;
            }
            Ok(())
        });
    }
}

fn clear_cloexec(fd: RawFd) -> nix::Result<()> {
    let mut flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD)?);
    flags.remove(FdFlag::FD_CLOEXEC);
    fcntl(fd, FcntlArg::F_SETFD(flags))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_closed_descriptor_is_rejected() {
        // Far above any descriptor the test process holds; a freshly closed
        // number could be reused by a parallel test.
        let fd: RawFd = 987_654;

        let err = open_descriptor(fd, OpenMode::Write).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(nix::libc::EBADF));
    }

    #[test]
    fn test_read_only_descriptor_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.json");
        std::fs::write(&path, b"{}").unwrap();
        let file = File::open(&path).unwrap();

        let err = open_descriptor(file.as_raw_fd(), OpenMode::Write).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let reader = open_descriptor(file.as_raw_fd(), OpenMode::Read).unwrap();
        assert_ne!(reader.as_raw_fd(), file.as_raw_fd());
    }

    #[test]
    fn test_opened_descriptor_leaves_original_open() {
        let mut file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();

        for line in [&b"first\n"[..], b"second\n"] {
            let mut writer = open_descriptor(fd, OpenMode::Write).unwrap();
            writer.write_all(line).unwrap();
        }

        // Both duplicates are closed; the original still works and shares the offset.
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "first\nsecond\n");

        let dup = open_descriptor(fd, OpenMode::Read).unwrap();
        let dup_flags = FdFlag::from_bits_truncate(fcntl(dup.as_raw_fd(), FcntlArg::F_GETFD).unwrap());
        assert!(dup_flags.contains(FdFlag::FD_CLOEXEC));
    }

    #[test]
    fn test_clear_cloexec_drops_only_that_flag() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        let before = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD).unwrap());
        assert!(before.contains(FdFlag::FD_CLOEXEC));

        clear_cloexec(fd).unwrap();

        let after = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD).unwrap());
        assert!(!after.contains(FdFlag::FD_CLOEXEC));
    }
}
