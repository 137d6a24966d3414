//! Catalog readers. The core only consumes `Vec<StarRecord>`; these are the
//! two on-disk forms the CLI and service know how to read.

pub mod bsc;
pub mod csv_catalog;

use std::path::Path;

use crate::StarRecord;

pub use bsc::{load_bsc_catalog, load_bsc_catalog_from_file};
pub use csv_catalog::read_star_csv;

/// Load a catalog, picking the reader from the file extension
/// (`.csv` → CSV, anything else → BSC JSON).
pub fn load_catalog<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<StarRecord>> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_star_csv(path),
        _ => load_bsc_catalog_from_file(path),
    }
}
