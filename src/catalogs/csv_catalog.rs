//! Plain CSV star lists: `id,ra_deg,dec_deg,mag[,name]` with a header row.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::StarRecord;

#[derive(Debug, Deserialize)]
struct CsvStar {
    id: u64,
    ra_deg: f64,
    dec_deg: f64,
    mag: f32,
    #[serde(default)]
    name: Option<String>,
}

impl From<CsvStar> for StarRecord {
    fn from(s: CsvStar) -> Self {
        StarRecord {
            id: s.id,
            ra_rad: s.ra_deg.to_radians(),
            dec_rad: s.dec_deg.to_radians(),
            mag: s.mag,
            name: s.name.filter(|n| !n.is_empty()),
        }
    }
}

pub fn read_star_csv_from_reader<R: Read>(reader: R) -> anyhow::Result<Vec<StarRecord>> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    rdr.deserialize::<CsvStar>()
        .map(|row| row.map(StarRecord::from))
        .collect::<Result<Vec<StarRecord>, ::csv::Error>>()
        .map_err(|e| e.into())
}

pub fn read_star_csv<P: AsRef<Path>>(file: P) -> anyhow::Result<Vec<StarRecord>> {
    let f = std::fs::File::open(file)?;
    read_star_csv_from_reader(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_with_and_without_names() {
        let data = "id,ra_deg,dec_deg,mag,name\n\
                    4301,165.932,61.751,1.79,Dubhe\n\
                    4335,167.416,44.499,3.01,\n";
        let stars = read_star_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(stars.len(), 2);
        assert_eq!(stars[0].name.as_deref(), Some("Dubhe"));
        assert!((stars[0].ra_rad.to_degrees() - 165.932).abs() < 1e-9);
        assert!(stars[1].name.is_none());
    }

    #[test]
    fn test_read_csv_bad_row() {
        let data = "id,ra_deg,dec_deg,mag\nabc,1.0,2.0,3.0\n";
        assert!(read_star_csv_from_reader(data.as_bytes()).is_err());
    }
}
