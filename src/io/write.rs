// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers for writing output files.

use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::trace;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::cli::Warn;

#[derive(Error, Debug)]
pub enum FileWriteError {
    #[error("Cannot write to the specified file '{file}'. Do you have write permissions set?")]
    FileNotWritable { file: String },

    #[error(
        "Couldn't create directory '{0}' for output files. Do you have write permissions set?"
    )]
    NewDirectory(PathBuf),

    #[error("Couldn't write '{file}': {err}")]
    IO { file: PathBuf, err: std::io::Error },
}

/// Test whether a file can be written to, before any expensive work is done.
/// The directories leading up to the file are created if necessary. If the
/// file already exists, a warning is issued about it being overwritten.
pub(crate) fn can_write_to_file(file: &Path) -> Result<(), FileWriteError> {
    trace!("Testing whether we can write to {}", file.display());

    let file_exists = file.exists();
    if file.is_dir() {
        return Err(FileWriteError::FileNotWritable {
            file: file.display().to_string(),
        });
    }
    create_parent_dir(file)?;

    match std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(file)
        .map_err(|e| e.kind())
    {
        // File is writable.
        Ok(_) => {
            // `OpenOptions::new` created it; don't leave a 0-sized file behind.
            if !file_exists {
                std::fs::remove_file(file).map_err(|err| FileWriteError::IO {
                    file: file.to_path_buf(),
                    err,
                })?;
            }
        }

        Err(std::io::ErrorKind::PermissionDenied) => {
            return Err(FileWriteError::FileNotWritable {
                file: file.display().to_string(),
            })
        }

        Err(e) => {
            return Err(FileWriteError::IO {
                file: file.to_path_buf(),
                err: e.into(),
            });
        }
    }

    if file_exists {
        format!("Will overwrite the existing file '{}'", file.display()).warn();
    }
    Ok(())
}

/// Write a file by writing to a temporary file in the same directory and then
/// renaming it over `file`. If anything fails, `file` is left as it was.
pub(crate) fn write_via_temp_file<F>(file: &Path, write_contents: F) -> Result<(), FileWriteError>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let io_err = |err| FileWriteError::IO {
        file: file.to_path_buf(),
        err,
    };

    let dir = create_parent_dir(file)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_contents(&mut writer).map_err(io_err)?;
        writer.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(file).map_err(|e| io_err(e.error))?;
    trace!("Wrote {}", file.display());

    Ok(())
}

/// Make the directory that `file` lives in (if needed) and return it.
fn create_parent_dir(file: &Path) -> Result<&Path, FileWriteError> {
    let dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.exists() {
        std::fs::DirBuilder::new()
            .recursive(true)
            .create(dir)
            .map_err(|_| FileWriteError::NewDirectory(dir.to_path_buf()))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_write_via_temp_file_creates_dirs() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let file = tmp_dir.path().join("a").join("b").join("out.txt");
        write_via_temp_file(&file, |w| writeln!(w, "hello")).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello\n");
    }

    #[test]
    fn test_failed_write_leaves_existing_file_alone() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let file = tmp_dir.path().join("out.txt");
        std::fs::write(&file, "original").unwrap();

        let result = write_via_temp_file(&file, |w| {
            writeln!(w, "partial")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))
        });
        assert!(matches!(result, Err(FileWriteError::IO { .. })));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
        // The temporary file was cleaned up.
        assert_eq!(std::fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_can_write_to_file() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let file = tmp_dir.path().join("new").join("out.tim");
        can_write_to_file(&file).unwrap();
        // No empty file is left behind.
        assert!(!file.exists());

        assert!(matches!(
            can_write_to_file(tmp_dir.path()),
            Err(FileWriteError::FileNotWritable { .. })
        ));
    }
}
