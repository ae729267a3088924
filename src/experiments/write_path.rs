//! Writing a short payload through a concrete file handle, through
//! `&mut dyn Write`, and (on unix) straight through the `write(2)` syscall.
//!
//! The `write` group targets one sink file, by default the null device. The
//! handle is opened once when the experiment is built and closed when the
//! experiment is dropped.
//!
//! The `stdout` group writes to the process's standard output, once through
//! [`io::stdout`] and once (on unix) through `write(2)` on descriptor 1.
//! Whatever descriptor 1 points at receives the bytes; wrap a run in a
//! [`StdoutRedirect`] to send them somewhere else.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;

use crate::error::Result;
use crate::experiment::{Experiment, Subject};
use crate::variant::{Dispatch, Inlining, Strategy, Variant, VariantGroup, VariantResult};

/// Bytes written per invocation.
pub const PAYLOAD: &[u8] = b"hello, world\n";

#[cfg(unix)]
const NULL_DEVICE: &str = "/dev/null";
#[cfg(not(unix))]
const NULL_DEVICE: &str = "NUL";

/// Open the null device for writing, falling back to an anonymous temporary
/// file when it cannot be opened.
pub fn open_null_device() -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .open(NULL_DEVICE)
        .or_else(|_| tempfile::tempfile())
}

/// Write through the concrete handle.
#[inline(never)]
pub fn write_via_file(file: &File, payload: &[u8]) -> io::Result<usize> {
    let mut handle = file;
    handle.write(payload)
}

/// Write through a trait object.
#[inline(never)]
pub fn write_via_dyn(writer: &mut dyn Write, payload: &[u8]) -> io::Result<usize> {
    writer.write(payload)
}

/// Write with `write(2)`, bypassing the standard library's `File`.
#[cfg(unix)]
#[inline(never)]
pub fn write_via_syscall(file: &File, payload: &[u8]) -> io::Result<usize> {
    use std::os::unix::io::AsRawFd;

    // `file` outlives the call, so its descriptor stays open
    raw_write(file.as_raw_fd(), payload)
}

/// Write through the locked standard output handle, flushing its buffer.
#[inline(never)]
pub fn write_via_stdout(payload: &[u8]) -> io::Result<usize> {
    let mut out = io::stdout().lock();
    let written = out.write(payload)?;
    out.flush()?;
    Ok(written)
}

/// Write with `write(2)` on descriptor 1.
#[cfg(unix)]
#[inline(never)]
pub fn write_via_fd1(payload: &[u8]) -> io::Result<usize> {
    raw_write(libc::STDOUT_FILENO, payload)
}

#[cfg(unix)]
fn raw_write(fd: std::os::unix::io::RawFd, payload: &[u8]) -> io::Result<usize> {
    // SAFETY: the pointer/length pair describes the initialized `payload`
    // slice; an invalid descriptor is reported by the kernel as EBADF.
    let written = unsafe { libc::write(fd, payload.as_ptr().cast::<libc::c_void>(), payload.len()) };
    if written < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(written as usize)
}

#[cfg(unix)]
static REDIRECT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Points descriptor 1 at another file until dropped.
///
/// Pending standard output is flushed to the original target first. On drop
/// the buffer is flushed again and the saved descriptor is put back.
/// Redirects are serialized process-wide: a second redirect waits until the
/// first one is dropped, so they must not be nested on one thread.
#[cfg(unix)]
pub struct StdoutRedirect {
    saved: std::os::unix::io::RawFd,
    _exclusive: std::sync::MutexGuard<'static, ()>,
}

#[cfg(unix)]
impl StdoutRedirect {
    /// Redirect descriptor 1 to `target`.
    pub fn to(target: &File) -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let exclusive = REDIRECT_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        io::stdout().flush()?;

        // SAFETY: dup and dup2 only operate on descriptor numbers; `target`
        // is open for the duration of the dup2 call.
        let saved = unsafe { libc::dup(libc::STDOUT_FILENO) };
        if saved < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::dup2(target.as_raw_fd(), libc::STDOUT_FILENO) } < 0 {
            let error = io::Error::last_os_error();
            // SAFETY: `saved` was returned by dup above and is owned here
            unsafe { libc::close(saved) };
            return Err(error);
        }

        Ok(Self {
            saved,
            _exclusive: exclusive,
        })
    }
}

#[cfg(unix)]
impl Drop for StdoutRedirect {
    fn drop(&mut self) {
        let _ = io::stdout().flush();

        // SAFETY: `saved` is a descriptor this guard owns and closes once
        let restored = unsafe { libc::dup2(self.saved, libc::STDOUT_FILENO) };
        if restored < 0 {
            crate::log_warn!(
                "write_path",
                "failed to restore stdout: {}",
                io::Error::last_os_error()
            );
        }
        unsafe { libc::close(self.saved) };
    }
}

/// The write paths, all targeting `file`.
pub fn write_group(file: File) -> VariantGroup<&'static [u8], usize> {
    let file = Arc::new(file);
    let via_dyn = Arc::clone(&file);

    let group = VariantGroup::new("write")
        .with(Variant::new(
            "file",
            Strategy::direct(),
            {
                let file = Arc::clone(&file);
                move |payload: &&'static [u8]| -> VariantResult<usize> {
                    Ok(write_via_file(&file, payload)?)
                }
            },
        ))
        .with(Variant::new(
            "dyn_writer",
            Strategy::new(Dispatch::Dynamic, Inlining::Opaque),
            move |payload: &&'static [u8]| -> VariantResult<usize> {
                let mut handle: &File = &via_dyn;
                Ok(write_via_dyn(&mut handle, payload)?)
            },
        ));

    #[cfg(unix)]
    let group = group.with(Variant::new(
        "raw_syscall",
        Strategy::new(Dispatch::Direct, Inlining::Opaque),
        move |payload: &&'static [u8]| -> VariantResult<usize> {
            Ok(write_via_syscall(&file, payload)?)
        },
    ));

    group
}

/// The standard output paths, all targeting descriptor 1.
pub fn stdout_group() -> VariantGroup<&'static [u8], usize> {
    let group = VariantGroup::new("stdout").with(Variant::new(
        "stdout",
        Strategy::new(Dispatch::Direct, Inlining::Opaque),
        |payload: &&'static [u8]| -> VariantResult<usize> { Ok(write_via_stdout(payload)?) },
    ));

    #[cfg(unix)]
    let group = group.with(Variant::new(
        "raw_fd1",
        Strategy::new(Dispatch::Direct, Inlining::Opaque),
        |payload: &&'static [u8]| -> VariantResult<usize> { Ok(write_via_fd1(payload)?) },
    ));

    group
}

/// The `write_path` experiment: the null device paths and the standard
/// output paths.
pub fn experiment() -> Result<Experiment> {
    let file = open_null_device()?;
    Experiment::builder("write_path")
        .subject(Subject::opaque("null_device"))
        .subject(Subject::opaque("stdout"))
        .group_with_units(
            "null_device",
            write_group(file),
            |_| PAYLOAD,
            PAYLOAD.len() as u64,
        )
        .group_with_units("stdout", stdout_group(), |_| PAYLOAD, PAYLOAD.len() as u64)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CorrectnessOracle;
    use std::io::{Read, Seek, SeekFrom};

    #[test]
    fn payload_is_thirteen_bytes() {
        assert_eq!(PAYLOAD.len(), 13);
    }

    #[test]
    fn every_path_writes_the_whole_payload() {
        let group = write_group(open_null_device().unwrap());
        let verified = CorrectnessOracle::new(20)
            .verify(&group, &|_| PAYLOAD)
            .unwrap();
        assert_eq!(verified.record().output("file"), Some(&PAYLOAD.len()));
    }

    #[test]
    fn paths_write_identical_bytes_to_a_regular_file() {
        let mut file = tempfile::tempfile().unwrap();
        let group = write_group(file.try_clone().unwrap());

        for variant in group.variants() {
            assert_eq!(variant.invoke(&PAYLOAD), Ok(PAYLOAD.len()));
        }

        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, PAYLOAD.repeat(group.len()));
    }
}
