use anyhow::Result;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use hcc_common::{SimError, SiteId};

use crate::lattice::{SiteRecord, SiteType};

// Raw CSV row; site_type uses the numeric codes 0=CV 1=PT 2=HEP 3=NO 4=CC 5=ECM.
#[derive(Debug, Deserialize)]
struct SiteRow {
    site_id: SiteId,
    x: f64,
    y: f64,
    site_type: u8,
}

/// Loads a `site_id,x,y,site_type` CSV file.
pub fn load_site_table<P: AsRef<Path>>(path: P) -> Result<Vec<SiteRecord>> {
    let path_ref = path.as_ref();
    let file = std::fs::File::open(path_ref)
        .map_err(|e| anyhow::anyhow!("Failed to open site table '{}': {}", path_ref.display(), e))?;
    read_site_table(file)
        .map_err(|e| anyhow::anyhow!("Failed to read site table '{}': {}", path_ref.display(), e))
}

/// Reads a site table from any CSV source with a header row.
pub fn read_site_table<R: Read>(reader: R) -> Result<Vec<SiteRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        let row: SiteRow = row?;
        let site_type = SiteType::from_code(row.site_type).ok_or_else(|| {
            SimError::InvalidSiteTable(format!("site {} has unknown type code {}", row.site_id, row.site_type))
        })?;
        records.push(SiteRecord { site_id: row.site_id, x: row.x, y: row.y, site_type });
    }
    log::info!("Loaded {} lattice sites.", records.len());
    Ok(records)
}
