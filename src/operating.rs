//! Swappable operating-system functions
//!
//! Code that touches the filesystem, the environment or the clock calls
//! through the free functions in this module instead of `std` directly.
//! Each thread holds its own [`System`] table, so a test can substitute a
//! function without affecting tests running on other threads.

use chrono::{DateTime, Local};
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Readable handle returned by [`System::open_file_read`]
pub type FileReader = Box<dyn Read + Send>;

/// Writable handle returned by [`System::open_file_write`]
pub type FileWriter = Box<dyn Write + Send>;

pub type OpenFileReadFn = dyn Fn(&Path, &OpenOptions) -> io::Result<FileReader> + Send + Sync;
pub type OpenFileWriteFn = dyn Fn(&Path, &OpenOptions) -> io::Result<FileWriter> + Send + Sync;
pub type GetenvFn = dyn Fn(&str) -> Option<String> + Send + Sync;
pub type NowFn = dyn Fn() -> DateTime<Local> + Send + Sync;

/// Table of operating-system functions
///
/// `System::default()` is the real implementation. Fields are public so a
/// test can replace any one of them.
#[derive(Clone)]
pub struct System {
    pub open_file_read: Arc<OpenFileReadFn>,
    pub open_file_write: Arc<OpenFileWriteFn>,
    pub getenv: Arc<GetenvFn>,
    pub now: Arc<NowFn>,
}

impl Default for System {
    fn default() -> Self {
        Self {
            open_file_read: Arc::new(|path: &Path, opts: &OpenOptions| -> io::Result<FileReader> {
                let file = opts.open(path)?;
                Ok(Box::new(file) as FileReader)
            }),
            open_file_write: Arc::new(|path: &Path, opts: &OpenOptions| -> io::Result<FileWriter> {
                let file = opts.open(path)?;
                Ok(Box::new(file) as FileWriter)
            }),
            getenv: Arc::new(|key: &str| std::env::var(key).ok()),
            now: Arc::new(Local::now),
        }
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System").finish_non_exhaustive()
    }
}

thread_local! {
    static SYSTEM: RefCell<System> = RefCell::new(System::default());
}

/// Snapshot of the current thread's table
pub fn system() -> System {
    SYSTEM.with(|s| s.borrow().clone())
}

/// Replace the current thread's table
pub fn set_system(system: System) {
    SYSTEM.with(|s| *s.borrow_mut() = system);
}

/// Modify the current thread's table in place
pub fn update_system(f: impl FnOnce(&mut System)) {
    SYSTEM.with(|s| f(&mut s.borrow_mut()));
}

/// Restore the real implementation for the current thread
pub fn reset_system() {
    set_system(System::default());
}

// The Arc is cloned out before the call so a substituted function may itself
// call back into this module.

/// Open a file for reading through the current table
pub fn open_file_read(path: &Path, opts: &OpenOptions) -> io::Result<FileReader> {
    let f = SYSTEM.with(|s| Arc::clone(&s.borrow().open_file_read));
    f(path, opts)
}

/// Open a file for writing through the current table
pub fn open_file_write(path: &Path, opts: &OpenOptions) -> io::Result<FileWriter> {
    let f = SYSTEM.with(|s| Arc::clone(&s.borrow().open_file_write));
    f(path, opts)
}

/// Look up an environment variable through the current table
pub fn getenv(key: &str) -> Option<String> {
    let f = SYSTEM.with(|s| Arc::clone(&s.borrow().getenv));
    f(key)
}

/// Current local time through the current table
pub fn now() -> DateTime<Local> {
    let f = SYSTEM.with(|s| Arc::clone(&s.borrow().now));
    f()
}

/// Read a whole file to a string through the current table
pub fn read_to_string(path: &Path) -> io::Result<String> {
    let mut reader = open_file_read(path, OpenOptions::new().read(true))?;
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[test]
    fn test_default_reads_real_files() -> anyhow::Result<()> {
        reset_system();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "on disk")?;

        assert_eq!(read_to_string(&path)?, "on disk");
        Ok(())
    }

    #[test]
    fn test_update_getenv() {
        let vars: HashMap<&str, &str> = HashMap::from([("PGPORT", "6000")]);
        update_system(move |sys| {
            sys.getenv = Arc::new(move |key: &str| vars.get(key).map(|v| v.to_string()));
        });

        assert_eq!(getenv("PGPORT").as_deref(), Some("6000"));
        assert_eq!(getenv("PGHOST"), None);

        reset_system();
    }

    #[test]
    fn test_reset_restores_clock() {
        let fixed = Local.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        update_system(move |sys| sys.now = Arc::new(move || fixed));
        assert_eq!(now(), fixed);

        reset_system();
        assert!(now() > fixed);
    }

    #[test]
    fn test_substitution_is_thread_local() {
        update_system(|sys| sys.getenv = Arc::new(|_: &str| Some("mocked".to_string())));

        let other = std::thread::spawn(|| getenv("DBHARNESS_SURELY_UNSET_VAR"))
            .join()
            .unwrap();
        assert_eq!(other, None);
        assert_eq!(getenv("DBHARNESS_SURELY_UNSET_VAR").as_deref(), Some("mocked"));

        reset_system();
    }

    #[test]
    fn test_snapshot_and_restore() {
        reset_system();
        let saved = system();

        update_system(|sys| sys.getenv = Arc::new(|_: &str| Some("mocked".to_string())));
        assert_eq!(getenv("DBHARNESS_SURELY_UNSET_VAR").as_deref(), Some("mocked"));

        set_system(saved);
        assert_eq!(getenv("DBHARNESS_SURELY_UNSET_VAR"), None);
    }

    #[test]
    fn test_write_then_read() -> anyhow::Result<()> {
        reset_system();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.log");

        let mut writer = open_file_write(&path, OpenOptions::new().create(true).write(true))?;
        writer.write_all(b"line\n")?;
        drop(writer);

        assert_eq!(read_to_string(&path)?, "line\n");
        Ok(())
    }
}
