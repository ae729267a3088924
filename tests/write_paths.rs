//! Write-path variants against real files.

use std::fs::{File, OpenOptions};
use std::io::Read;

use tempfile::NamedTempFile;
#[cfg(unix)]
use variant_lab::experiments::write_path::StdoutRedirect;
use variant_lab::experiments::write_path::{self, PAYLOAD};
use variant_lab::{CorrectnessOracle, LabError};

/// Standard output is descriptor 1, the one `raw_fd1` writes to.
#[cfg(unix)]
#[test]
fn test_stdout_is_descriptor_one() {
    use std::os::unix::io::AsRawFd;
    assert_eq!(std::io::stdout().as_raw_fd(), 1);
}

/// Redirecting every path to a file leaves one payload per invocation, in
/// order.
#[test]
fn test_redirected_writes_land_in_file() {
    let target = NamedTempFile::new().unwrap();
    let handle = OpenOptions::new().append(true).open(target.path()).unwrap();
    let group = write_path::write_group(handle);

    let verified = CorrectnessOracle::new(10)
        .verify(&group, &|_| PAYLOAD)
        .unwrap();
    assert_eq!(verified.record().inputs_checked, 10);

    let mut contents = Vec::new();
    File::open(target.path())
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();

    assert_eq!(contents.len(), 10 * group.len() * PAYLOAD.len());
    assert!(contents.chunks(PAYLOAD.len()).all(|chunk| chunk == PAYLOAD));
}

/// A handle that cannot be written to fails the reference variant instead
/// of reporting zero bytes.
#[test]
fn test_read_only_handle_fails_verification() {
    let target = NamedTempFile::new().unwrap();
    let read_only = File::open(target.path()).unwrap();
    let group = write_path::write_group(read_only);

    match CorrectnessOracle::new(10).verify(&group, &|_| PAYLOAD) {
        Err(LabError::VariantExecutionFailure { variant, .. }) => assert_eq!(variant, "file"),
        other => panic!("expected execution failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_null_device_accepts_payload() {
    let group = write_path::write_group(write_path::open_null_device().unwrap());
    for variant in group.variants() {
        assert_eq!(variant.invoke(&PAYLOAD).unwrap(), PAYLOAD.len());
    }
}

#[cfg(unix)]
fn payload_count(file: &File) -> usize {
    use std::io::{Seek, SeekFrom};

    let mut reader = file.try_clone().unwrap();
    let mut contents = Vec::new();
    reader.seek(SeekFrom::Start(0)).unwrap();
    reader.read_to_end(&mut contents).unwrap();
    contents
        .windows(PAYLOAD.len())
        .filter(|window| *window == PAYLOAD)
        .count()
}

#[cfg(unix)]
fn stdout_identity() -> (u64, u64) {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();
    let result = unsafe { libc::fstat(libc::STDOUT_FILENO, stat.as_mut_ptr()) };
    assert_eq!(result, 0);
    let stat = unsafe { stat.assume_init() };
    (stat.st_dev as u64, stat.st_ino as u64)
}

/// Both standard output paths follow a redirect of descriptor 1.
#[cfg(unix)]
#[test]
fn test_stdout_paths_follow_redirect() {
    let target = tempfile::tempfile().unwrap();
    let group = write_path::stdout_group();
    assert_eq!(group.len(), 2);

    {
        let _redirect = StdoutRedirect::to(&target).unwrap();
        let verified = CorrectnessOracle::new(10)
            .verify(&group, &|_| PAYLOAD)
            .unwrap();
        assert_eq!(verified.record().output("stdout"), Some(&PAYLOAD.len()));
        assert_eq!(verified.record().output("raw_fd1"), Some(&PAYLOAD.len()));
    }

    assert_eq!(payload_count(&target), 10 * group.len());
}

/// Dropping the redirect puts the original descriptor back, and later
/// writes no longer reach the old target.
#[cfg(unix)]
#[test]
fn test_redirect_restores_descriptor_one() {
    let original = stdout_identity();
    let first = tempfile::tempfile().unwrap();
    let second = tempfile::tempfile().unwrap();

    {
        let _redirect = StdoutRedirect::to(&first).unwrap();
        assert_ne!(stdout_identity(), original);
        assert_eq!(write_path::write_via_fd1(PAYLOAD).unwrap(), PAYLOAD.len());
    }
    assert_eq!(stdout_identity(), original);

    {
        let _redirect = StdoutRedirect::to(&second).unwrap();
        assert_eq!(write_path::write_via_stdout(PAYLOAD).unwrap(), PAYLOAD.len());
        assert_eq!(write_path::write_via_fd1(PAYLOAD).unwrap(), PAYLOAD.len());
    }
    assert_eq!(stdout_identity(), original);

    assert_eq!(payload_count(&first), 1);
    assert_eq!(payload_count(&second), 2);
}
