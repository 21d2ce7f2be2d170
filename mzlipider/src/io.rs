//! Readers for the JSON interchange files: scan caches and MS1 hit lists
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mzlipid::{CachedScan, ChromatogramAccessError, ElementTable, InMemoryScanCache, Ms1Hit};

use crate::driver::MZLipiderError;

/// One centroided spectrum as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub time: f64,
    pub ms_level: u8,
    #[serde(default)]
    pub precursor_mz: Option<f64>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
}

impl TryFrom<ScanRecord> for CachedScan {
    type Error = ChromatogramAccessError;

    fn try_from(value: ScanRecord) -> Result<Self, Self::Error> {
        CachedScan::from_arrays(
            value.time,
            value.ms_level,
            value.precursor_mz,
            &value.mz,
            &value.intensity,
        )
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Open `path` for reading, decompressing it when it ends in `.gz`
fn open_maybe_compressed(path: &Path) -> io::Result<Box<dyn Read>> {
    let fh = BufReader::new(fs::File::open(path)?);
    if is_gzipped(path) {
        debug!("Reading {} as gzip", path.display());
        Ok(Box::new(GzDecoder::new(fh)))
    } else {
        Ok(Box::new(fh))
    }
}

pub fn read_scans(path: &Path) -> Result<InMemoryScanCache, MZLipiderError> {
    let records: Vec<ScanRecord> = serde_json::from_reader(open_maybe_compressed(path)?)?;
    let scans = records
        .into_iter()
        .map(CachedScan::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InMemoryScanCache::new(scans))
}

pub fn read_hits(path: &Path) -> Result<Vec<Ms1Hit>, MZLipiderError> {
    let hits: Vec<Ms1Hit> = serde_json::from_reader(open_maybe_compressed(path)?)?;
    for id in hits.iter().map(|h| h.id.as_str()).duplicates() {
        warn!("Hit identifier {id} occurs more than once");
    }
    Ok(hits)
}

pub fn read_element_table(path: &Path) -> Result<ElementTable, MZLipiderError> {
    let text = fs::read_to_string(path)?;
    Ok(text.parse()?)
}

#[cfg(test)]
mod test {
    use super::*;
    use mzlipid::ScanProvider;

    #[test]
    fn test_read_scans() -> Result<(), MZLipiderError> {
        let plain = read_scans(Path::new("./tests/data/scans.json"))?;
        let packed = read_scans(Path::new("./tests/data/scans.json.gz"))?;
        assert_eq!(plain.len(), 202);
        assert_eq!(plain.len(), packed.len());
        assert_eq!(plain.time_range(), packed.time_range());
        assert!(plain.has_spectra_in_region(9.9, 10.1, 2).unwrap());
        Ok(())
    }

    #[test]
    fn test_read_hits() -> Result<(), MZLipiderError> {
        let hits = read_hits(Path::new("./tests/data/hits.json"))?;
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].sum_composition.as_ref().map(|s| s.to_string()).as_deref(), Some("34:1"));
        assert_eq!(hits[1].rt_bounds(), Some((9.8, 10.2)));
        Ok(())
    }

    #[test]
    fn test_malformed_scan() {
        let record = ScanRecord {
            time: 1.0,
            ms_level: 1,
            precursor_mz: None,
            mz: vec![100.0, 200.0],
            intensity: vec![1.0],
        };
        assert!(CachedScan::try_from(record).is_err());
    }
}
