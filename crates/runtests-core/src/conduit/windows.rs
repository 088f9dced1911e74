#![allow(unsafe_code)]

use super::OpenMode;
use std::ffi::c_void;
use std::fs::File;
use std::io;
use std::os::windows::io::{BorrowedHandle, RawHandle};
use windows::Win32::Foundation::{
    GetHandleInformation, SetHandleInformation, HANDLE, HANDLE_FLAGS, HANDLE_FLAG_INHERIT,
};

fn raw(handle: u64) -> HANDLE {
    HANDLE(handle as usize as *mut c_void)
}

/// Duplicate an inherited handle into a file.
///
/// The handle is queried first so a closed or foreign value fails here
/// instead of on the first write. The conduit's handle stays open; the
/// returned file owns a non-inheritable duplicate.
pub(super) fn open_handle(handle: u64, mode: OpenMode) -> io::Result<File> {
    let mut flags = 0u32;
    // SAFETY: GetHandleInformation only reads the handle table entry.
    unsafe { GetHandleInformation(raw(handle), &mut flags) }.map_err(io::Error::from)?;
    tracing::debug!(handle, %mode, flags, "duplicating inherited handle");

    // SAFETY: the handle is open (queried above) and only borrowed for the
    // DuplicateHandle call behind try_clone_to_owned.
    let borrowed = unsafe { BorrowedHandle::borrow_raw(handle as usize as RawHandle) };
    Ok(File::from(borrowed.try_clone_to_owned()?))
}

pub(super) fn set_inheritable(handle: u64, inheritable: bool) -> io::Result<()> {
    let flags = if inheritable {
        HANDLE_FLAG_INHERIT
    } else {
        HANDLE_FLAGS(0)
    };
    // SAFETY: only the inherit bit of a caller-owned handle is changed.
    unsafe { SetHandleInformation(raw(handle), HANDLE_FLAG_INHERIT.0, flags) }
        .map_err(io::Error::from)
}
