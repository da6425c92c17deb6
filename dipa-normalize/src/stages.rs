//! Stage builders.
//!
//! One builder method per pipeline stage. Given the tier being templated, an
//! iteration and the group image to register against, each method returns the
//! [`Task`] for that stage plus any manifest files the task reads. Builders
//! never touch the graph; the tier planner owns wiring.
//!
//! Warp builders take a [`Reference`] to the group image they register
//! against. A reference can only come from the builder of the stage that
//! produces that image, and each warp checks it was handed the right one, so a
//! warp can never be planned against a mean that does not exist yet.

use crate::catalog::Manifest;
use crate::config::PlanSettings;
use crate::error::{PlanError, Result};
use crate::naming::{
    ComposedStage, ManifestKind, MeanStage, NamingScheme, TemplateFile, TierKey, WarpStage,
};
use crate::types::{StageKind, Task};

/// Tolerance handed to diffeomorphic registration
const DIFFEOMORPHIC_FTOL: &str = "0.002";

/// Immediate child of the tier being templated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntity {
    pub id: String,

    /// Raw tensor image for leaf entities, the child tier's template otherwise
    pub image: String,
}

/// Which group is being templated and its immediate children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierContext {
    /// Index of `template_tier` in the hierarchy
    pub depth: usize,
    pub template_tier: String,
    pub template_id: String,
    pub source_tier: String,
    pub sources: Vec<SourceEntity>,
}

impl TierContext {
    pub fn group_key(&self) -> TierKey<'_> {
        TierKey::new(&self.template_tier, &self.template_id)
    }

    pub fn entity_key<'a>(&'a self, source: &'a SourceEntity) -> TierKey<'a> {
        TierKey::new(&self.source_tier, &source.id)
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id.as_str())
    }
}

/// Stage parameters shared by every tier
#[derive(Debug, Clone, PartialEq)]
pub struct StageOptions {
    pub similarity_metric: String,
    pub separation_coarse: f64,
    pub rigid: u32,
    pub affine: u32,
    pub diffeomorphic: u32,
    pub transfer_intermediates: bool,
}

impl From<&PlanSettings> for StageOptions {
    fn from(settings: &PlanSettings) -> Self {
        StageOptions {
            similarity_metric: settings.similarity_metric.clone(),
            separation_coarse: settings.separation_coarse,
            rigid: settings.rigid,
            affine: settings.affine,
            diffeomorphic: settings.diffeomorphic,
            transfer_intermediates: settings.transfer_intermediates,
        }
    }
}

/// Group image produced by a template or mean stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub stage: StageKind,
    pub iteration: Option<u32>,
    pub image: String,
}

/// Output of a builder: the task and the manifests it reads
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStage {
    pub task: Task,
    pub manifests: Vec<Manifest>,
}

impl From<Task> for BuiltStage {
    fn from(task: Task) -> Self {
        BuiltStage {
            task,
            manifests: Vec::new(),
        }
    }
}

/// Builds the tasks of one tier
pub struct StageBuilder<'a> {
    naming: &'a NamingScheme,
    options: &'a StageOptions,
    tier: &'a TierContext,
}

impl<'a> StageBuilder<'a> {
    pub fn new(naming: &'a NamingScheme, options: &'a StageOptions, tier: &'a TierContext) -> Self {
        StageBuilder {
            naming,
            options,
            tier,
        }
    }

    fn fixed(&self) -> bool {
        self.naming.is_fixed()
    }

    fn group_task(&self, stage: StageKind, iteration: Option<u32>) -> Task {
        Task::new(stage, &self.tier.template_tier, &self.tier.template_id, iteration)
    }

    fn entity_task(&self, stage: StageKind, source: &SourceEntity, iteration: Option<u32>) -> Task {
        Task::new(stage, &self.tier.source_tier, &source.id, iteration)
    }

    fn sep_coarse(&self) -> String {
        self.options.separation_coarse.to_string()
    }

    /// Group image a warp of `stage` at `iteration` must register against
    pub fn registration_target(&self, stage: StageKind, iteration: u32) -> (StageKind, Option<u32>) {
        if self.fixed() {
            return (StageKind::CreateTemplate, None);
        }
        let previous = iteration.saturating_sub(1);
        match (stage, iteration) {
            (StageKind::RigidWarp, 1) => (StageKind::CreateTemplate, None),
            (StageKind::RigidWarp, _) => (StageKind::RigidMean, Some(previous)),
            (StageKind::AffineWarpA | StageKind::AffineWarpB, 1) => {
                (StageKind::RigidMean, Some(self.options.rigid))
            }
            (StageKind::AffineWarpA | StageKind::AffineWarpB, _) => {
                (StageKind::AffineMeanB, Some(previous))
            }
            (StageKind::DiffeomorphicWarp, 1) => (StageKind::AffineMeanB, Some(self.options.affine)),
            (StageKind::DiffeomorphicWarp, _) => (StageKind::DiffeomorphicMean, Some(previous)),
            _ => (StageKind::DiffeomorphicMean, Some(self.options.diffeomorphic)),
        }
    }

    fn check_target(&self, task: &Task, target: &Reference, iteration: u32) -> Result<()> {
        let (stage, expected_iteration) = self.registration_target(task.stage, iteration);
        if target.stage == stage && target.iteration == expected_iteration {
            return Ok(());
        }
        if stage == StageKind::CreateTemplate {
            return Err(PlanError::MissingInitialTemplate {
                task: task.id.clone(),
            });
        }
        Err(PlanError::UnexpectedReference {
            task: task.id.clone(),
            expected: match expected_iteration {
                Some(n) => format!("{} (iteration {})", stage, n),
                None => stage.to_string(),
            },
            actual: target.stage,
        })
    }

    /// Image and cumulative transform an entity enters the affine stage with
    fn affine_inputs(&self, key: TierKey<'_>, iteration: u32) -> (String, String) {
        let previous = if iteration == 1 {
            WarpStage::Rigid(self.options.rigid)
        } else {
            WarpStage::Affine(iteration - 1)
        };
        (
            self.naming.warped(key, previous),
            self.naming.transform(key, previous),
        )
    }

    // ========================================================================
    // Template initialisation
    // ========================================================================

    pub fn image_dim(&self, source: &SourceEntity) -> BuiltStage {
        let key = self.tier.entity_key(source);
        let record = self.naming.dimension_record(key);
        self.entity_task(StageKind::ImageDim, source, None)
            .with_arguments([
                format!("--id={}", source.id),
                format!("--inputfile={}", source.image),
                format!("--outputfile={}", record),
            ])
            .with_inputs([source.image.as_str()])
            .with_outputs([record], self.options.transfer_intermediates)
            .into()
    }

    /// Initial template of the tier: an average of the sources when
    /// bootstrapping, the resampled fixed template otherwise
    pub fn create_template(&self) -> (BuiltStage, Reference) {
        let group = self.tier.group_key();
        let naming = self.naming;
        let file = |f| naming.template_file(group, f);

        let lookup = Manifest::lookup(
            naming.manifest(group, ManifestKind::DimensionLookup),
            self.tier
                .sources
                .iter()
                .map(|s| (s.id.as_str(), naming.dimension_record(self.tier.entity_key(s)))),
        );
        let records: Vec<String> = self
            .tier
            .sources
            .iter()
            .map(|s| naming.dimension_record(self.tier.entity_key(s)))
            .collect();
        let initial = file(TemplateFile::Initial);

        let mut task = self.group_task(StageKind::CreateTemplate, None);
        let mut manifests = Vec::new();

        if self.fixed() {
            let template = naming.template(group);
            task = task
                .with_arguments([
                    "--lookupfile".to_string(),
                    lookup.name.clone(),
                    "--template".to_string(),
                    template.clone(),
                    "--resamplefile".to_string(),
                    file(TemplateFile::ResampleFlag),
                    "--vsizefile".to_string(),
                    file(TemplateFile::VoxelSize),
                    "--isovsizefile".to_string(),
                    file(TemplateFile::IsoVoxelSize),
                    "--dimsizefile".to_string(),
                    file(TemplateFile::Dimensions),
                    "--initial".to_string(),
                    initial.clone(),
                    "--mask".to_string(),
                    file(TemplateFile::Mask),
                    "--trace".to_string(),
                    file(TemplateFile::Trace),
                ])
                .with_inputs([lookup.name.clone(), template])
                .with_inputs(records)
                .with_outputs(
                    [
                        file(TemplateFile::ResampleFlag),
                        file(TemplateFile::VoxelSize),
                        file(TemplateFile::IsoVoxelSize),
                        file(TemplateFile::Dimensions),
                        initial.clone(),
                        file(TemplateFile::Mask),
                        file(TemplateFile::Trace),
                    ],
                    self.options.transfer_intermediates,
                );
        } else {
            let inputs = Manifest::list(
                naming.manifest(group, ManifestKind::InitialTemplateInputs),
                self.tier.sources.iter().map(|s| s.image.as_str()),
            );
            task = task
                .with_arguments([
                    "--lookupfile".to_string(),
                    lookup.name.clone(),
                    "--templateinputsfile".to_string(),
                    inputs.name.clone(),
                    "--resamplefile".to_string(),
                    file(TemplateFile::ResampleFlag),
                    "--vsizefile".to_string(),
                    file(TemplateFile::VoxelSize),
                    "--isovsizefile".to_string(),
                    file(TemplateFile::IsoVoxelSize),
                    "--dimsizefile".to_string(),
                    file(TemplateFile::Dimensions),
                    "--orig".to_string(),
                    file(TemplateFile::InitialOrig),
                    "--initial".to_string(),
                    initial.clone(),
                ])
                .with_inputs([lookup.name.clone(), inputs.name.clone()])
                .with_inputs(self.tier.sources.iter().map(|s| s.image.as_str()))
                .with_inputs(records)
                .with_outputs(
                    [
                        file(TemplateFile::ResampleFlag),
                        file(TemplateFile::VoxelSize),
                        file(TemplateFile::IsoVoxelSize),
                        file(TemplateFile::Dimensions),
                        file(TemplateFile::InitialOrig),
                        initial.clone(),
                    ],
                    self.options.transfer_intermediates,
                );
            manifests.push(inputs);
        }
        manifests.insert(0, lookup);

        let reference = Reference {
            stage: StageKind::CreateTemplate,
            iteration: None,
            image: initial,
        };
        (BuiltStage { task, manifests }, reference)
    }

    // ========================================================================
    // Rigid
    // ========================================================================

    pub fn rigid_warp(
        &self,
        source: &SourceEntity,
        iteration: u32,
        target: &Reference,
    ) -> Result<BuiltStage> {
        let task = self.entity_task(StageKind::RigidWarp, source, Some(iteration));
        self.check_target(&task, target, iteration)?;

        let key = self.tier.entity_key(source);
        let warped = self.naming.warped(key, WarpStage::Rigid(iteration));
        let transform = self.naming.transform(key, WarpStage::Rigid(iteration));
        let image = if iteration == 1 {
            source.image.clone()
        } else {
            self.naming.warped(key, WarpStage::Rigid(iteration - 1))
        };

        let mut task = task
            .with_arguments([
                "--mean".to_string(),
                target.image.clone(),
                "--image".to_string(),
                image.clone(),
                "--smoption".to_string(),
                self.options.similarity_metric.clone(),
                "--sepcoarse".to_string(),
                self.sep_coarse(),
                "--outimage".to_string(),
                warped.clone(),
                "--outtransform".to_string(),
                transform.clone(),
            ])
            .with_inputs([image, target.image.clone()]);

        if iteration == 1 {
            task = task.with_arguments(["--initial"]);
        } else {
            let prior = self.naming.transform(key, WarpStage::Rigid(iteration - 1));
            task = task
                .with_arguments(["--transform".to_string(), prior.clone()])
                .with_inputs([prior]);
        }

        Ok(task
            .with_outputs([warped, transform], self.options.transfer_intermediates)
            .into())
    }

    pub fn rigid_mean(&self, iteration: u32) -> (BuiltStage, Reference) {
        let group = self.tier.group_key();
        let warped: Vec<String> = self
            .tier
            .sources
            .iter()
            .map(|s| {
                self.naming
                    .warped(self.tier.entity_key(s), WarpStage::Rigid(iteration))
            })
            .collect();
        let manifest = Manifest::list(
            self.naming.manifest(group, ManifestKind::RigidWarps(iteration)),
            &warped,
        );
        let previous = if iteration == 1 {
            self.naming.template_file(group, TemplateFile::Initial)
        } else {
            self.naming.mean(group, MeanStage::Rigid(iteration - 1))
        };
        let mean = self.naming.mean(group, MeanStage::Rigid(iteration));

        let task = self
            .group_task(StageKind::RigidMean, Some(iteration))
            .with_arguments([
                "--affinelist".to_string(),
                manifest.name.clone(),
                "--newmean".to_string(),
                mean.clone(),
                "--previousmean".to_string(),
                previous.clone(),
                "--smoption".to_string(),
                self.options.similarity_metric.clone(),
            ])
            .with_inputs([manifest.name.clone()])
            .with_inputs(warped)
            .with_inputs([previous])
            .with_outputs([mean.clone()], self.options.transfer_intermediates);

        let reference = Reference {
            stage: StageKind::RigidMean,
            iteration: Some(iteration),
            image: mean,
        };
        (
            BuiltStage {
                task,
                manifests: vec![manifest],
            },
            reference,
        )
    }

    // ========================================================================
    // Affine
    // ========================================================================

    /// Phase A: forward affine of the entity against the current group image
    pub fn affine_warp_a(
        &self,
        source: &SourceEntity,
        iteration: u32,
        target: &Reference,
    ) -> Result<BuiltStage> {
        let task = self.entity_task(StageKind::AffineWarpA, source, Some(iteration));
        self.check_target(&task, target, iteration)?;

        let key = self.tier.entity_key(source);
        let (image, prior) = self.affine_inputs(key, iteration);
        let forward = self.naming.forward_affine(key, iteration);

        Ok(task
            .with_arguments([
                "--mean".to_string(),
                target.image.clone(),
                "--image".to_string(),
                image.clone(),
                "--transform".to_string(),
                prior.clone(),
                "--smoption".to_string(),
                self.options.similarity_metric.clone(),
                "--sepcoarse".to_string(),
                self.sep_coarse(),
                "--outtransform".to_string(),
                forward.clone(),
            ])
            .with_inputs([image, prior, target.image.clone()])
            .with_outputs([forward], self.options.transfer_intermediates)
            .into())
    }

    /// Inverse of the mean forward affine, used to re-centre the group
    pub fn affine_mean_a(&self, iteration: u32) -> (BuiltStage, Reference) {
        let group = self.tier.group_key();
        let forwards: Vec<String> = self
            .tier
            .sources
            .iter()
            .map(|s| self.naming.forward_affine(self.tier.entity_key(s), iteration))
            .collect();
        let manifest = Manifest::list(
            self.naming
                .manifest(group, ManifestKind::AffineForwards(iteration)),
            &forwards,
        );
        let inverse = self.naming.inverse_mean(group, iteration);

        let task = self
            .group_task(StageKind::AffineMeanA, Some(iteration))
            .with_arguments([
                "--invlist".to_string(),
                manifest.name.clone(),
                "--invaff".to_string(),
                inverse.clone(),
            ])
            .with_inputs([manifest.name.clone()])
            .with_inputs(forwards)
            .with_outputs([inverse.clone()], self.options.transfer_intermediates);

        let reference = Reference {
            stage: StageKind::AffineMeanA,
            iteration: Some(iteration),
            image: inverse,
        };
        (
            BuiltStage {
                task,
                manifests: vec![manifest],
            },
            reference,
        )
    }

    /// Phase B: apply the inverse-mean correction and resample the entity.
    ///
    /// `correction` is the phase A mean of the same iteration. Fixed mode has
    /// no group to re-centre and takes `None`.
    pub fn affine_warp_b(
        &self,
        source: &SourceEntity,
        iteration: u32,
        target: &Reference,
        correction: Option<&Reference>,
    ) -> Result<BuiltStage> {
        let task = self.entity_task(StageKind::AffineWarpB, source, Some(iteration));
        self.check_target(&task, target, iteration)?;

        let key = self.tier.entity_key(source);
        let (image, prior) = self.affine_inputs(key, iteration);
        let forward = self.naming.forward_affine(key, iteration);
        let warped = self.naming.warped(key, WarpStage::Affine(iteration));
        let transform = self.naming.transform(key, WarpStage::Affine(iteration));

        let mut task = task
            .with_arguments([
                "--mean".to_string(),
                target.image.clone(),
                "--image".to_string(),
                image.clone(),
                "--transform".to_string(),
                prior.clone(),
                "--forward".to_string(),
                forward.clone(),
            ])
            .with_inputs([image, prior, forward, target.image.clone()]);

        if !self.fixed() {
            let correction = match correction {
                Some(c) if c.stage == StageKind::AffineMeanA && c.iteration == Some(iteration) => c,
                Some(c) => {
                    return Err(PlanError::UnexpectedReference {
                        task: task.id.clone(),
                        expected: format!("{} (iteration {})", StageKind::AffineMeanA, iteration),
                        actual: c.stage,
                    })
                }
                None => {
                    return Err(PlanError::MissingReference {
                        task: task.id.clone(),
                        expected: format!("{} (iteration {})", StageKind::AffineMeanA, iteration),
                    })
                }
            };
            task = task
                .with_arguments(["--invaff".to_string(), correction.image.clone()])
                .with_inputs([correction.image.clone()]);
        }

        Ok(task
            .with_arguments([
                "--outimage".to_string(),
                warped.clone(),
                "--outtransform".to_string(),
                transform.clone(),
            ])
            .with_outputs([warped, transform], self.options.transfer_intermediates)
            .into())
    }

    /// Group mean of the corrected affine warps; the last iteration also
    /// emits the brain mask and trace used by the diffeomorphic stage
    pub fn affine_mean_b(&self, iteration: u32) -> (BuiltStage, Reference) {
        let group = self.tier.group_key();
        let warped: Vec<String> = self
            .tier
            .sources
            .iter()
            .map(|s| {
                self.naming
                    .warped(self.tier.entity_key(s), WarpStage::Affine(iteration))
            })
            .collect();
        let manifest = Manifest::list(
            self.naming.manifest(group, ManifestKind::AffineWarps(iteration)),
            &warped,
        );
        let mean = self.naming.mean(group, MeanStage::Affine(iteration));

        let mut task = self
            .group_task(StageKind::AffineMeanB, Some(iteration))
            .with_arguments([
                "--affinelist".to_string(),
                manifest.name.clone(),
                "--newmean".to_string(),
                mean.clone(),
            ])
            .with_inputs([manifest.name.clone()])
            .with_inputs(warped)
            .with_outputs([mean.clone()], self.options.transfer_intermediates);

        if iteration == self.options.affine {
            let mask = self.naming.template_file(group, TemplateFile::Mask);
            let trace = self.naming.template_file(group, TemplateFile::Trace);
            task = task
                .with_arguments([
                    "--mask".to_string(),
                    mask.clone(),
                    "--trace".to_string(),
                    trace.clone(),
                ])
                .with_outputs([mask, trace], self.options.transfer_intermediates);
        }

        let reference = Reference {
            stage: StageKind::AffineMeanB,
            iteration: Some(iteration),
            image: mean,
        };
        (
            BuiltStage {
                task,
                manifests: vec![manifest],
            },
            reference,
        )
    }

    // ========================================================================
    // Diffeomorphic
    // ========================================================================

    pub fn diffeomorphic_warp(
        &self,
        source: &SourceEntity,
        iteration: u32,
        target: &Reference,
    ) -> Result<BuiltStage> {
        let task = self.entity_task(StageKind::DiffeomorphicWarp, source, Some(iteration));
        self.check_target(&task, target, iteration)?;

        let group = self.tier.group_key();
        let key = self.tier.entity_key(source);
        let image = self.naming.warped(key, WarpStage::Affine(self.options.affine));
        let mask = self.naming.template_file(group, TemplateFile::Mask);
        let warped = self.naming.warped(key, WarpStage::Diffeomorphic(iteration));
        let field = self.naming.transform(key, WarpStage::Diffeomorphic(iteration));

        let mut task = task
            .with_arguments([
                "--mean".to_string(),
                target.image.clone(),
                "--image".to_string(),
                image.clone(),
                "--mask".to_string(),
                mask.clone(),
                "--ftol".to_string(),
                DIFFEOMORPHIC_FTOL.to_string(),
            ])
            .with_inputs([image, mask, target.image.clone()]);

        if iteration > 1 {
            let prior = self
                .naming
                .transform(key, WarpStage::Diffeomorphic(iteration - 1));
            task = task
                .with_arguments(["--initialdf".to_string(), prior.clone()])
                .with_inputs([prior]);
        }

        Ok(task
            .with_arguments([
                "--outimage".to_string(),
                warped.clone(),
                "--outdf".to_string(),
                field.clone(),
            ])
            .with_outputs([warped, field], self.options.transfer_intermediates)
            .into())
    }

    pub fn diffeomorphic_mean(&self, iteration: u32) -> (BuiltStage, Reference) {
        let group = self.tier.group_key();
        let warped: Vec<String> = self
            .tier
            .sources
            .iter()
            .map(|s| {
                self.naming
                    .warped(self.tier.entity_key(s), WarpStage::Diffeomorphic(iteration))
            })
            .collect();
        let manifest = Manifest::list(
            self.naming
                .manifest(group, ManifestKind::DiffeomorphicWarps(iteration)),
            &warped,
        );
        let mean = self.naming.mean(group, MeanStage::Diffeomorphic(iteration));

        let task = self
            .group_task(StageKind::DiffeomorphicMean, Some(iteration))
            .with_arguments([
                "--difflist".to_string(),
                manifest.name.clone(),
                "--newmean".to_string(),
                mean.clone(),
            ])
            .with_inputs([manifest.name.clone()])
            .with_inputs(warped)
            .with_outputs([mean.clone()], self.options.transfer_intermediates);

        let reference = Reference {
            stage: StageKind::DiffeomorphicMean,
            iteration: Some(iteration),
            image: mean,
        };
        (
            BuiltStage {
                task,
                manifests: vec![manifest],
            },
            reference,
        )
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Concatenate the entity's final affine and diffeomorphic transforms into
    /// one forward and one inverse field, and warp the entity with it
    pub fn compose_warp(&self, source: &SourceEntity, target: &Reference) -> Result<BuiltStage> {
        let task = self.entity_task(StageKind::ComposeWarp, source, None);
        let (stage, iteration) = self.registration_target(StageKind::ComposeWarp, 0);
        if target.stage != stage || target.iteration != iteration {
            return Err(PlanError::UnexpectedReference {
                task: task.id.clone(),
                expected: stage.to_string(),
                actual: target.stage,
            });
        }

        let key = self.tier.entity_key(source);
        let affine = self
            .naming
            .transform(key, WarpStage::Affine(self.options.affine));
        let field = self
            .naming
            .transform(key, WarpStage::Diffeomorphic(self.options.diffeomorphic));
        let combined = self.naming.transform(key, WarpStage::Compose);
        let inverse = self.naming.inverse_field(key, ComposedStage::Tier);
        let warped = self.naming.warped(key, WarpStage::Compose);

        Ok(task
            .with_arguments([
                "--image".to_string(),
                source.image.clone(),
                "--affine".to_string(),
                affine.clone(),
                "--df".to_string(),
                field.clone(),
                "--mean".to_string(),
                target.image.clone(),
                "--outdf".to_string(),
                combined.clone(),
                "--outinvdf".to_string(),
                inverse.clone(),
                "--outimage".to_string(),
                warped.clone(),
            ])
            .with_inputs([source.image.clone(), affine, field, target.image.clone()])
            .with_outputs([combined, inverse, warped], true)
            .into())
    }

    /// Tier template: the mean of all composed warps plus its isotropic
    /// resampling. This image is the next tier's source for this group.
    pub fn compose_mean(&self) -> (BuiltStage, Reference) {
        let group = self.tier.group_key();
        let warped: Vec<String> = self
            .tier
            .sources
            .iter()
            .map(|s| self.naming.warped(self.tier.entity_key(s), WarpStage::Compose))
            .collect();
        let manifest = Manifest::list(
            self.naming.manifest(group, ManifestKind::ComposedWarps),
            &warped,
        );
        let iso_vsize = self.naming.template_file(group, TemplateFile::IsoVoxelSize);
        let template = self.naming.mean(group, MeanStage::Compose);
        let template_iso = self.naming.template_iso(group);

        let task = self
            .group_task(StageKind::ComposeMean, None)
            .with_arguments([
                "--warplist".to_string(),
                manifest.name.clone(),
                "--isovsizefile".to_string(),
                iso_vsize.clone(),
                "--template".to_string(),
                template.clone(),
                "--isotemplate".to_string(),
                template_iso.clone(),
            ])
            .with_inputs([manifest.name.clone(), iso_vsize])
            .with_inputs(warped)
            .with_outputs([template.clone(), template_iso], true);

        let reference = Reference {
            stage: StageKind::ComposeMean,
            iteration: None,
            image: template,
        };
        (
            BuiltStage {
                task,
                manifests: vec![manifest],
            },
            reference,
        )
    }
}

/// End-to-end field from a leaf entity to the root template.
///
/// `chain` lists the composed fields on the path from the root tier down to
/// the leaf's own tier, in that order.
pub fn compose_full_warp(
    naming: &NamingScheme,
    leaf: TierKey<'_>,
    image: &str,
    chain: &[String],
) -> BuiltStage {
    let full = naming.transform(leaf, WarpStage::Full);
    let inverse = naming.inverse_field(leaf, ComposedStage::Full);
    let warped = naming.warped(leaf, WarpStage::Full);

    let mut args = vec!["--image".to_string(), image.to_string()];
    for field in chain {
        args.push("--df".to_string());
        args.push(field.clone());
    }
    args.extend([
        "--outdf".to_string(),
        full.clone(),
        "--outinvdf".to_string(),
        inverse.clone(),
        "--outimage".to_string(),
        warped.clone(),
    ]);

    Task::new(StageKind::ComposeFullWarp, leaf.tier, leaf.id, None)
        .with_arguments(args)
        .with_inputs([image])
        .with_inputs(chain.iter().map(String::as_str))
        .with_outputs([full, inverse, warped], true)
        .into()
}
