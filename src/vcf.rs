// vcf.rs

use crate::error::{GwasSimError, Result};
use crate::genotype::HaplotypeMatrix;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use noodles_vcf::{
    self as vcf,
    variant::record::{samples::Series as VcfSeriesTrait, AlternateBases as _},
};
use std::path::Path;

#[derive(Debug)]
pub struct VcfHaplotypes {
    pub sample_names: Vec<String>,
    pub haplotypes: HaplotypeMatrix,
    /// Records dropped because they were not bi-allelic SNPs with complete diploid calls.
    pub skipped_records: usize,
}

#[inline(always)]
fn parse_gt_alleles(gt_string: &str) -> Option<[u8; 2]> {
    let bytes = gt_string.as_bytes();
    if bytes.len() != 3 { return None; }
    if bytes[1] != b'/' && bytes[1] != b'|' { return None; }
    let allele1 = match bytes[0] {
        b'0' => 0u8, b'1' => 1u8, _ => return None,
    };
    let allele2 = match bytes[2] {
        b'0' => 0u8, b'1' => 1u8, _ => return None,
    };
    Some([allele1, allele2])
}

fn record_position(record: &vcf::Record) -> u64 {
    record
        .variant_start()
        .map_or(0u64, |res_p| res_p.map_or(0u64, |p| p.get() as u64))
}

/// Reads the two haplotype calls of every sample from a diploid VCF.
///
/// Only bi-allelic SNPs with a complete `GT` call for every sample are kept.
/// Fails when the sample count differs from `expected_samples` or when no record survives.
pub fn read_haplotypes(vcf_path: &Path, expected_samples: usize) -> Result<VcfHaplotypes> {
    info!("Reading haplotypes from VCF: {}", vcf_path.display());
    let io_err = |e: std::io::Error| GwasSimError::io(vcf_path, e);

    let mut reader = vcf::io::reader::Builder::default()
        .build_from_path(vcf_path)
        .map_err(io_err)?;
    let header = reader.read_header().map_err(io_err)?;

    let sample_names: Vec<String> = header.sample_names().iter().cloned().collect();
    if sample_names.len() != expected_samples {
        return Err(GwasSimError::upstream(format!(
            "VCF {} holds {} samples but {} were requested.",
            vcf_path.display(),
            sample_names.len(),
            expected_samples
        )));
    }

    let gt_key_str = vcf::variant::record::samples::keys::key::GENOTYPE;
    if !header.formats().contains_key(gt_key_str) {
        return Err(GwasSimError::upstream(format!(
            "GT key (FORMAT={}) not found in FORMAT header for VCF {}",
            gt_key_str,
            vcf_path.display()
        )));
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} VCF records") {
        spinner.set_style(style);
    }

    let num_haplotypes = 2 * expected_samples;
    let mut site_rows: Vec<Vec<u8>> = Vec::new();
    let mut skipped_records = 0usize;
    let mut record_buffer = vcf::Record::default();

    while reader.read_record(&mut record_buffer).map_err(io_err)? != 0 {
        spinner.inc(1);
        let record = &record_buffer;

        let ref_bases_str = record.reference_bases();
        let alt_bases_obj = record.alternate_bases();
        if ref_bases_str.len() != 1 || alt_bases_obj.len() != 1 || alt_bases_obj.as_ref().len() != 1 {
            debug!(
                "Variant at {}:{} (REF:{}, ALT:{}) is not a bi-allelic SNP, skipping.",
                record.reference_sequence_name(),
                record_position(record),
                ref_bases_str,
                alt_bases_obj.as_ref()
            );
            skipped_records += 1;
            continue;
        }

        match collect_site_haplotypes(record, &header, num_haplotypes) {
            Some(row) => site_rows.push(row),
            None => {
                debug!(
                    "Variant at {}:{} dropped (missing/unparsable/incomplete GTs).",
                    record.reference_sequence_name(),
                    record_position(record)
                );
                skipped_records += 1;
            }
        }
    }
    spinner.finish_and_clear();

    if skipped_records > 0 {
        warn!("Skipped {} VCF record(s) in {}.", skipped_records, vcf_path.display());
    }
    if site_rows.is_empty() {
        return Err(GwasSimError::upstream(format!(
            "No variant sites present in {}.",
            vcf_path.display()
        )));
    }
    info!(
        "Read {} bi-allelic sites for {} samples.",
        site_rows.len(),
        expected_samples
    );

    let haplotypes = HaplotypeMatrix::from_site_rows(site_rows, num_haplotypes)?;
    Ok(VcfHaplotypes {
        sample_names,
        haplotypes,
        skipped_records,
    })
}

fn collect_site_haplotypes(
    record: &vcf::Record,
    header: &vcf::Header,
    num_haplotypes: usize,
) -> Option<Vec<u8>> {
    let samples_obj = record.samples();
    let gt_series = samples_obj.select(vcf::variant::record::samples::keys::key::GENOTYPE)?;

    let mut row: Vec<u8> = Vec::with_capacity(num_haplotypes);
    for value_option_result in gt_series.iter(header) {
        if row.len() >= num_haplotypes {
            return None;
        }
        match value_option_result {
            Ok(Some(vcf::variant::record::samples::series::Value::String(gt_string_cow_val))) => {
                let alleles = parse_gt_alleles(gt_string_cow_val.as_ref())?;
                row.extend_from_slice(&alleles);
            }
            Ok(Some(vcf::variant::record::samples::series::Value::Genotype(boxed_gt))) => {
                let mut alleles: Vec<u8> = Vec::with_capacity(2);
                for result_item in boxed_gt.iter() {
                    match result_item {
                        Ok((Some(0), _)) => alleles.push(0),
                        Ok((Some(1), _)) => alleles.push(1),
                        _ => return None,
                    }
                }
                if alleles.len() != 2 {
                    return None;
                }
                row.extend_from_slice(&alleles);
            }
            _ => return None,
        }
    }

    if row.len() == num_haplotypes { Some(row) } else { None }
}
