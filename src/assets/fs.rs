//! Logo cache filesystem seam.
//!
//! The cache talks to storage through [`LogoFs`] so host tests can run
//! against a temp directory instead of the SD card. All methods take a
//! bare file name; implementations own the directory layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage operations the logo cache needs.
pub trait LogoFs: Send {
    fn exists(&self, file_name: &str) -> bool;
    fn read(&self, file_name: &str) -> io::Result<Vec<u8>>;
    /// Durable write: the file is either fully present with the new
    /// contents or absent — never truncated.
    fn write_atomic(&self, file_name: &str, bytes: &[u8]) -> io::Result<()>;
    fn remove(&self, file_name: &str) -> io::Result<()>;
}

/// [`LogoFs`] over a directory on a std filesystem (SD card VFS mount
/// on-device, any directory on the host).
pub struct StdLogoFs {
    root: PathBuf,
}

impl StdLogoFs {
    /// Opens (creating if needed) the cache directory.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

impl LogoFs for StdLogoFs {
    fn exists(&self, file_name: &str) -> bool {
        self.path_of(file_name).is_file()
    }

    fn read(&self, file_name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path_of(file_name))
    }

    fn write_atomic(&self, file_name: &str, bytes: &[u8]) -> io::Result<()> {
        let final_path = self.path_of(file_name);
        let tmp_path = self.path_of(&format!("{file_name}.tmp"));
        {
            let mut file = fs::File::create(&tmp_path)?;
            io::Write::write_all(&mut file, bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)
    }

    fn remove(&self, file_name: &str) -> io::Result<()> {
        fs::remove_file(self.path_of(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdLogoFs::new(dir.path().join("logos")).unwrap();
        assert!(!fs.exists("chrome.png"));

        fs.write_atomic("chrome.png", b"png-bytes").unwrap();
        assert!(fs.exists("chrome.png"));
        assert_eq!(fs.read("chrome.png").unwrap(), b"png-bytes");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdLogoFs::new(dir.path()).unwrap();
        fs.write_atomic("vlc.png", &[0u8; 1024]).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("vlc.png")]);
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdLogoFs::new(dir.path()).unwrap();
        fs.write_atomic("a.png", b"old").unwrap();
        fs.write_atomic("a.png", b"new").unwrap();
        assert_eq!(fs.read("a.png").unwrap(), b"new");
    }

    #[test]
    fn remove_clears_presence() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdLogoFs::new(dir.path()).unwrap();
        fs.write_atomic("a.png", b"x").unwrap();
        fs.remove("a.png").unwrap();
        assert!(!fs.exists("a.png"));
    }
}
