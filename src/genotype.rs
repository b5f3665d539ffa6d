// genotype.rs

use crate::error::{GwasSimError, Result};
use log::debug;
use ndarray::{Array2, Array3, ArrayView1, Axis};

/// Position of one sampled individual on the simulated landscape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Location) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Haplotype calls, sites as rows and haplotypes as columns.
/// Columns `2i` and `2i + 1` belong to individual `i`.
#[derive(Clone, Debug)]
pub struct HaplotypeMatrix {
    calls: Array2<u8>,
}

impl HaplotypeMatrix {
    pub fn new(calls: Array2<u8>) -> Result<Self> {
        if calls.ncols() % 2 != 0 {
            return Err(GwasSimError::upstream(format!(
                "Haplotype matrix has {} columns; expected an even number for diploid individuals.",
                calls.ncols()
            )));
        }
        if let Some(bad) = calls.iter().find(|&&c| c > 1) {
            return Err(GwasSimError::upstream(format!(
                "Haplotype matrix contains non-biallelic call {}.",
                bad
            )));
        }
        Ok(Self { calls })
    }

    /// Builds the matrix from per-site rows of haplotype calls.
    pub fn from_site_rows(rows: Vec<Vec<u8>>, num_haplotypes: usize) -> Result<Self> {
        let num_sites = rows.len();
        let mut calls = Array2::<u8>::zeros((num_sites, num_haplotypes));
        for (site_idx, row) in rows.into_iter().enumerate() {
            if row.len() != num_haplotypes {
                return Err(GwasSimError::upstream(format!(
                    "Haplotype count mismatch at site {}: expected {}, found {}.",
                    site_idx,
                    num_haplotypes,
                    row.len()
                )));
            }
            for (hap_idx, call) in row.into_iter().enumerate() {
                calls[[site_idx, hap_idx]] = call;
            }
        }
        Self::new(calls)
    }

    pub fn num_sites(&self) -> usize {
        self.calls.nrows()
    }

    pub fn num_individuals(&self) -> usize {
        self.calls.ncols() / 2
    }

    pub fn calls(&self) -> &Array2<u8> {
        &self.calls
    }
}

/// Allele counts with shape `(sites, individuals, 2)`.
/// The last axis holds the reference count at 0 and the alternate count at 1.
#[derive(Clone, Debug)]
pub struct AlleleCounts {
    counts: Array3<u8>,
}

impl AlleleCounts {
    pub fn from_haplotypes(haplotypes: &HaplotypeMatrix) -> Self {
        let num_sites = haplotypes.num_sites();
        let num_individuals = haplotypes.num_individuals();
        let calls = haplotypes.calls();
        let mut counts = Array3::<u8>::zeros((num_sites, num_individuals, 2));
        for site in 0..num_sites {
            for ind in 0..num_individuals {
                let alt = calls[[site, 2 * ind]] + calls[[site, 2 * ind + 1]];
                counts[[site, ind, 0]] = 2 - alt;
                counts[[site, ind, 1]] = alt;
            }
        }
        debug!(
            "Built allele counts for {} sites x {} individuals.",
            num_sites, num_individuals
        );
        Self { counts }
    }

    /// Builds counts directly from alternate-allele dosages, sites as rows.
    pub fn from_alt_dosages(alt: &Array2<u8>) -> Result<Self> {
        if let Some(bad) = alt.iter().find(|&&c| c > 2) {
            return Err(GwasSimError::upstream(format!(
                "Alternate allele count {} is outside 0..=2.",
                bad
            )));
        }
        let (num_sites, num_individuals) = alt.dim();
        let mut counts = Array3::<u8>::zeros((num_sites, num_individuals, 2));
        for ((site, ind), &a) in alt.indexed_iter() {
            counts[[site, ind, 0]] = 2 - a;
            counts[[site, ind, 1]] = a;
        }
        Ok(Self { counts })
    }

    pub fn num_sites(&self) -> usize {
        self.counts.len_of(Axis(0))
    }

    pub fn num_individuals(&self) -> usize {
        self.counts.len_of(Axis(1))
    }

    pub fn alt_count(&self, site: usize, individual: usize) -> u8 {
        self.counts[[site, individual, 1]]
    }

    /// Alternate counts of every individual at `site`.
    pub fn alt_counts_at(&self, site: usize) -> ArrayView1<'_, u8> {
        self.counts.slice(ndarray::s![site, .., 1])
    }

    /// Alternate copies at `site` divided by the number of sampled chromosomes.
    pub fn alt_frequency(&self, site: usize) -> f64 {
        let n = self.num_individuals();
        if n == 0 {
            return 0.0;
        }
        let alt_copies: u32 = self.alt_counts_at(site).iter().map(|&c| c as u32).sum();
        alt_copies as f64 / (2 * n) as f64
    }

    /// Reference dosages with individuals as rows and sites as columns, ready for PCA.
    pub fn reference_dosage_matrix(&self) -> Array2<f64> {
        let ref_view = self.counts.index_axis(Axis(2), 0);
        ref_view.t().mapv(|c| c as f64)
    }

    pub fn counts(&self) -> &Array3<u8> {
        &self.counts
    }
}
