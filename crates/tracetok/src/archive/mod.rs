//! Container formats whose files are themselves traces.

mod entry;
pub mod tar;
pub mod zip;

pub use self::entry::{compare_entries, parse_entries, ArchiveEntry};
pub use self::tar::TarReader;
pub use self::zip::ZipReader;
