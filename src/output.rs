// output.rs

use crate::error::{GwasSimError, Result};
use crate::genotype::Location;
use log::info;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Family and individual identifier of the `index`-th sampled individual.
pub fn sample_id(index: usize) -> String {
    format!("msp_{}", index)
}

fn create_output_file(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| GwasSimError::io(path, e))
}

fn finish(path: &Path, mut writer: BufWriter<File>) -> Result<()> {
    writer.flush().map_err(|e| GwasSimError::io(path, e))
}

/// One `x y` row per individual.
pub fn write_locations(path: &Path, locations: &[Location]) -> Result<()> {
    let mut writer = create_output_file(path)?;
    info!("Writing {} locations to {}", locations.len(), path.display());
    for loc in locations {
        writeln!(writer, "{} {}", loc.x, loc.y).map_err(|e| GwasSimError::io(path, e))?;
    }
    finish(path, writer)
}

/// `msp_i msp_i pc1 ... pcK` per individual, the covariate layout plink expects.
pub fn write_covariates(path: &Path, covariates: &Array2<f64>) -> Result<()> {
    let mut writer = create_output_file(path)?;
    info!(
        "Writing {} principal components for {} individuals to {}",
        covariates.ncols(),
        covariates.nrows(),
        path.display()
    );
    for (sample_idx, row) in covariates.rows().into_iter().enumerate() {
        let id = sample_id(sample_idx);
        write!(writer, "{} {}", id, id).map_err(|e| GwasSimError::io(path, e))?;
        for value in row.iter() {
            write!(writer, " {}", value).map_err(|e| GwasSimError::io(path, e))?;
        }
        writeln!(writer).map_err(|e| GwasSimError::io(path, e))?;
    }
    finish(path, writer)
}

/// `msp_i msp_i value` per individual.
pub fn write_phenotypes(path: &Path, phenotypes: &[f64]) -> Result<()> {
    let mut writer = create_output_file(path)?;
    info!("Writing {} phenotypes to {}", phenotypes.len(), path.display());
    for (sample_idx, value) in phenotypes.iter().enumerate() {
        let id = sample_id(sample_idx);
        writeln!(writer, "{} {} {}", id, id, value).map_err(|e| GwasSimError::io(path, e))?;
    }
    finish(path, writer)
}

pub fn write_causal_sites(path: &Path, sites: &[usize]) -> Result<()> {
    let mut writer = create_output_file(path)?;
    info!("Writing {} causal site indices to {}", sites.len(), path.display());
    for site in sites {
        writeln!(writer, "{}", site).map_err(|e| GwasSimError::io(path, e))?;
    }
    finish(path, writer)
}

pub fn write_hotspots(path: &Path, hotspots: &[Location]) -> Result<()> {
    info!("Writing {} hotspots to {}", hotspots.len(), path.display());
    write_locations(path, hotspots)
}
