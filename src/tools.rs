// tools.rs

use crate::error::{GwasSimError, Result};
use log::{debug, info};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs `program` to completion and returns its stdout.
/// Spawn failures and non-zero exits both surface as `ExternalTool` errors with stderr attached.
pub fn run_tool<I, S>(program: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    debug!("Running external command: {:?}", command);

    let output = command.output().map_err(|e| GwasSimError::ExternalTool {
        program: program.display().to_string(),
        status: "failed to start".to_string(),
        stderr: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(GwasSimError::ExternalTool {
            program: program.display().to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Turns the sampler's VCF into PED/MAP files sharing `out_prefix`.
pub trait PedConverter {
    fn convert(&self, vcf_path: &Path, out_prefix: &Path) -> Result<()>;
}

pub struct VcftoolsConverter {
    pub program: PathBuf,
}

impl PedConverter for VcftoolsConverter {
    fn convert(&self, vcf_path: &Path, out_prefix: &Path) -> Result<()> {
        info!("Converting {} to PED/MAP with vcftools", vcf_path.display());
        run_tool(
            &self.program,
            [
                OsStr::new("--vcf"),
                vcf_path.as_os_str(),
                OsStr::new("--out"),
                out_prefix.as_os_str(),
                OsStr::new("--plink"),
            ],
        )?;
        Ok(())
    }
}

/// Inputs of one association run; every path shares the run's prefix.
#[derive(Clone, Debug)]
pub struct AssociationInputs {
    pub ped_prefix: PathBuf,
    pub phenotypes: PathBuf,
    pub covariates: PathBuf,
}

pub trait AssociationRunner {
    /// Linear association adjusted for the covariate file.
    fn run_adjusted(&self, inputs: &AssociationInputs) -> Result<()>;
    /// Association without covariates.
    fn run_unadjusted(&self, inputs: &AssociationInputs) -> Result<()>;
}

pub struct PlinkRunner {
    pub program: PathBuf,
}

impl PlinkRunner {
    fn base_args(inputs: &AssociationInputs) -> Vec<&OsStr> {
        vec![
            OsStr::new("--noweb"),
            OsStr::new("--file"),
            inputs.ped_prefix.as_os_str(),
            OsStr::new("--pheno"),
            inputs.phenotypes.as_os_str(),
            OsStr::new("--allow-no-sex"),
            OsStr::new("--out"),
            inputs.ped_prefix.as_os_str(),
        ]
    }
}

impl AssociationRunner for PlinkRunner {
    fn run_adjusted(&self, inputs: &AssociationInputs) -> Result<()> {
        info!("Running plink --linear with covariates {}", inputs.covariates.display());
        let mut args = Self::base_args(inputs);
        args.extend([
            OsStr::new("--linear"),
            OsStr::new("--covar"),
            inputs.covariates.as_os_str(),
            OsStr::new("--hide-covar"),
        ]);
        run_tool(&self.program, args)?;
        Ok(())
    }

    fn run_unadjusted(&self, inputs: &AssociationInputs) -> Result<()> {
        info!("Running plink --assoc without covariates");
        let mut args = Self::base_args(inputs);
        args.push(OsStr::new("--assoc"));
        run_tool(&self.program, args)?;
        Ok(())
    }
}
