//! Deterministic artifact naming.
//!
//! Tasks never hold references to each other's files. A warp task finds the
//! group mean it registers against by asking the naming scheme for the same
//! `(tier, id, stage, iteration)` the mean task used when it declared its
//! output. Every function here is pure and returns byte-identical strings for
//! identical arguments.
//!
//! Names are built from a tier prefix `"{tier}-{id}"`, so a site template and
//! a subject with the same id never collide.

use std::fmt;

/// A `(tier, id)` pair, rendered as `"{tier}-{id}"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TierKey<'a> {
    pub tier: &'a str,
    pub id: &'a str,
}

impl<'a> TierKey<'a> {
    pub fn new(tier: &'a str, id: &'a str) -> Self {
        TierKey { tier, id }
    }
}

impl fmt::Display for TierKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tier, self.id)
    }
}

/// Registration output of a single entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarpStage {
    Rigid(u32),
    Affine(u32),
    Diffeomorphic(u32),
    Compose,
    Full,
}

/// Stage that emits an inverse deformation field alongside its forward one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposedStage {
    /// Per-tier composition
    Tier,
    /// Leaf to root composition
    Full,
}

/// Group mean produced once per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeanStage {
    Rigid(u32),
    Affine(u32),
    Diffeomorphic(u32),
    /// Final tier template
    Compose,
}

/// Per-tier files written by the template initialisation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFile {
    ResampleFlag,
    VoxelSize,
    IsoVoxelSize,
    Dimensions,
    InitialOrig,
    Initial,
    Mask,
    Trace,
}

/// Generated manifest (list or lookup table) consumed by a group stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// `ID,FILE` table of per-entity dimension records
    DimensionLookup,
    /// Images averaged into the initial template
    InitialTemplateInputs,
    RigidWarps(u32),
    /// Phase A forward transforms fed to the inverse-mean step
    AffineForwards(u32),
    AffineWarps(u32),
    DiffeomorphicWarps(u32),
    ComposedWarps,
}

/// Maps `(tier, id, stage, iteration)` to canonical file names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingScheme {
    fixed_template: Option<String>,
}

impl NamingScheme {
    /// Naming for a bootstrapped (iteratively built) template
    pub fn bootstrap() -> Self {
        NamingScheme {
            fixed_template: None,
        }
    }

    /// Naming for registration to an externally supplied template
    pub fn fixed(template: impl Into<String>) -> Self {
        NamingScheme {
            fixed_template: Some(template.into()),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_template.is_some()
    }

    /// Template of a tier; the fixed template itself in fixed mode
    pub fn template(&self, key: TierKey<'_>) -> String {
        match &self.fixed_template {
            Some(path) => path.clone(),
            None => self.mean(key, MeanStage::Compose),
        }
    }

    /// Isotropically resampled variant of the tier template
    pub fn template_iso(&self, key: TierKey<'_>) -> String {
        format!("{}_template_iso.nii.gz", key)
    }

    pub fn template_file(&self, key: TierKey<'_>, file: TemplateFile) -> String {
        match file {
            TemplateFile::ResampleFlag => format!("{}_template_resample_bool.txt", key),
            TemplateFile::VoxelSize => format!("{}_template_vsize.txt", key),
            TemplateFile::IsoVoxelSize => format!("{}_template_iso_vsize.txt", key),
            TemplateFile::Dimensions => format!("{}_template_dim.txt", key),
            TemplateFile::InitialOrig => format!("{}_initial_template_orig.nii.gz", key),
            TemplateFile::Initial => format!("{}_initial_template.nii.gz", key),
            TemplateFile::Mask => format!("{}_mask.nii.gz", key),
            TemplateFile::Trace => format!("{}_tr.nii.gz", key),
        }
    }

    pub fn mean(&self, key: TierKey<'_>, stage: MeanStage) -> String {
        match stage {
            MeanStage::Rigid(n) => format!("{}_mean_rigid{}.nii.gz", key, n),
            MeanStage::Affine(n) => format!("{}_mean_affine{}.nii.gz", key, n),
            MeanStage::Diffeomorphic(n) => format!("{}_mean_diffeo{}.nii.gz", key, n),
            MeanStage::Compose => format!("{}_template.nii.gz", key),
        }
    }

    /// Inverse-mean correction computed by the first affine phase
    pub fn inverse_mean(&self, key: TierKey<'_>, iteration: u32) -> String {
        format!("{}_mean_inv{}.aff", key, iteration)
    }

    pub fn warped(&self, key: TierKey<'_>, stage: WarpStage) -> String {
        match stage {
            WarpStage::Rigid(n) => format!("{}_rigid{}.nii.gz", key, n),
            WarpStage::Affine(n) => format!("{}_affine{}.nii.gz", key, n),
            WarpStage::Diffeomorphic(n) => format!("{}_diffeo{}.nii.gz", key, n),
            WarpStage::Compose => format!("{}_combined.nii.gz", key),
            WarpStage::Full => format!("{}_full.nii.gz", key),
        }
    }

    pub fn transform(&self, key: TierKey<'_>, stage: WarpStage) -> String {
        match stage {
            WarpStage::Rigid(n) => format!("{}_rigid{}.aff", key, n),
            WarpStage::Affine(n) => format!("{}_affine{}.aff", key, n),
            WarpStage::Diffeomorphic(n) => format!("{}_diffeo{}.df.nii.gz", key, n),
            WarpStage::Compose => format!("{}_combined.df.nii.gz", key),
            WarpStage::Full => format!("{}_full.df.nii.gz", key),
        }
    }

    /// Inverse deformation field of a composed stage
    pub fn inverse_field(&self, key: TierKey<'_>, stage: ComposedStage) -> String {
        match stage {
            ComposedStage::Tier => format!("{}_combined.df_inv.nii.gz", key),
            ComposedStage::Full => format!("{}_full.df_inv.nii.gz", key),
        }
    }

    /// Uncorrected forward affine of phase A
    pub fn forward_affine(&self, key: TierKey<'_>, iteration: u32) -> String {
        format!("{}_affineA{}.aff", key, iteration)
    }

    pub fn dimension_record(&self, key: TierKey<'_>) -> String {
        format!("{}_dimensions.csv", key)
    }

    pub fn manifest(&self, key: TierKey<'_>, kind: ManifestKind) -> String {
        match kind {
            ManifestKind::DimensionLookup => format!("{}_dimension_files.csv", key),
            ManifestKind::InitialTemplateInputs => format!("{}_initial_template_input.txt", key),
            ManifestKind::RigidWarps(n) => format!("{}_rigid{}_template_input.txt", key, n),
            ManifestKind::AffineForwards(n) => format!("{}_affine{}_inv_input.txt", key, n),
            ManifestKind::AffineWarps(n) => format!("{}_affine{}_template_input.txt", key, n),
            ManifestKind::DiffeomorphicWarps(n) => {
                format!("{}_diffeo{}_template_input.txt", key, n)
            }
            ManifestKind::ComposedWarps => format!("{}_combined_template_input.txt", key),
        }
    }
}
