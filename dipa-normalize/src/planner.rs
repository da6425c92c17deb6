//! Tier planner.
//!
//! Walks the hierarchy from the root and emits, for every group, the full
//! template pipeline over that group's immediate children. Child tiers are
//! planned before their parent so every edge points at a task that already
//! exists. Each recursive call returns the tasks the parent has to wait for
//! and the composed-warp chain of every leaf below it.
//!
//! Graph and manifest catalog live in a single [`PlanBuilder`] owned by the
//! top-level call. Nothing is returned to the caller unless the whole pass
//! succeeds.

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::ArtifactCatalog;
use crate::config::{NormalizeConfig, PlanSettings};
use crate::entity::{group_by, Entity, EntityTable};
use crate::error::Result;
use crate::graph::{TaskRef, WorkflowGraph};
use crate::naming::{NamingScheme, TierKey, WarpStage};
use crate::stages::{
    compose_full_warp, BuiltStage, SourceEntity, StageBuilder, StageOptions, TierContext,
};
use crate::types::StageKind;

/// Complete output of a planning pass
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationPlan {
    /// Settings the plan was built with
    pub settings: PlanSettings,

    /// Tasks and edges for the execution engine
    pub graph: WorkflowGraph,

    /// Manifest files that must be written before the graph runs
    pub catalog: ArtifactCatalog,
}

impl NormalizationPlan {
    pub fn task_count(&self) -> usize {
        self.graph.len()
    }

    pub fn count(&self, stage: StageKind) -> usize {
        self.graph.count(stage)
    }
}

/// Plan normalization of every entity in `table`.
///
/// Configuration is resolved first, so an unknown species or a malformed
/// hierarchy fails before the table is inspected.
pub fn plan(table: &EntityTable, config: &NormalizeConfig) -> Result<NormalizationPlan> {
    let settings = config.resolve()?;
    plan_with_settings(table, settings)
}

/// Plan with already resolved settings
pub fn plan_with_settings(table: &EntityTable, settings: PlanSettings) -> Result<NormalizationPlan> {
    let entities = table.entities(&settings)?;
    let refs: Vec<&Entity> = entities.iter().collect();

    info!(
        entities = entities.len(),
        hierarchy = %settings.hierarchy.join(" > "),
        fixed = settings.is_fixed(),
        species = %settings.species,
        "Planning normalization"
    );

    let mut builder = PlanBuilder::new(&settings);
    let outcome = builder.plan_tier(&refs, 0)?;

    if settings.hierarchy.len() > 2 {
        builder.emit_full_warps(outcome.chains)?;
    }

    let PlanBuilder { graph, catalog, .. } = builder;
    info!(
        tasks = graph.len(),
        edges = graph.edges().len(),
        manifests = catalog.len(),
        "Normalization plan complete"
    );

    Ok(NormalizationPlan {
        settings,
        graph,
        catalog,
    })
}

/// Composed fields on the path between a leaf entity and the tier currently
/// being returned from, leaf first
#[derive(Debug, Clone)]
struct LeafChain {
    tier: String,
    id: String,
    image: String,
    fields: Vec<String>,
    tasks: Vec<TaskRef>,
}

/// What a tier hands back to its parent
#[derive(Debug, Default)]
struct TierOutcome {
    /// Tasks the parent's ImageDim of this group waits for
    terminal: Vec<TaskRef>,
    chains: Vec<LeafChain>,
}

/// Per-tier results of the registration pipeline
struct TierTasks {
    composes: Vec<TaskRef>,
    terminal: Vec<TaskRef>,
}

/// Accumulates the graph and manifest catalog across the recursion
struct PlanBuilder<'a> {
    settings: &'a PlanSettings,
    naming: NamingScheme,
    options: StageOptions,
    graph: WorkflowGraph,
    catalog: ArtifactCatalog,
}

impl<'a> PlanBuilder<'a> {
    fn new(settings: &'a PlanSettings) -> Self {
        let naming = match &settings.template {
            Some(path) => NamingScheme::fixed(path.clone()),
            None => NamingScheme::bootstrap(),
        };
        PlanBuilder {
            settings,
            naming,
            options: StageOptions::from(settings),
            graph: WorkflowGraph::new(),
            catalog: ArtifactCatalog::new(),
        }
    }

    fn add(&mut self, built: BuiltStage) -> Result<TaskRef> {
        for manifest in built.manifests {
            self.catalog.insert(manifest)?;
        }
        self.graph.add_task(built.task)
    }

    fn add_after(&mut self, built: BuiltStage, parents: &[TaskRef]) -> Result<TaskRef> {
        let task = self.add(built)?;
        self.graph.add_edges(parents, task)?;
        Ok(task)
    }

    // ========================================================================
    // Recursion
    // ========================================================================

    /// Plan the group formed by `entities` at `depth`, children first
    fn plan_tier(&mut self, entities: &[&Entity], depth: usize) -> Result<TierOutcome> {
        let settings = self.settings;
        let hierarchy = &settings.hierarchy;
        let leaf_depth = hierarchy.len() - 1;
        let source_depth = depth + 1;

        let template_tier = hierarchy[depth].clone();
        let source_tier = hierarchy[source_depth].clone();
        let template_id = entities
            .first()
            .map(|e| e.level(depth).to_string())
            .unwrap_or_default();

        debug!(
            tier = %template_tier,
            id = %template_id,
            sources = %source_tier,
            "Descending into tier"
        );

        let mut sources = Vec::new();
        let mut upstream: Vec<Vec<TaskRef>> = Vec::new();
        let mut child_chains: Vec<Vec<LeafChain>> = Vec::new();

        if source_depth == leaf_depth {
            for entity in entities {
                sources.push(SourceEntity {
                    id: entity.leaf_id().to_string(),
                    image: entity.spd.clone(),
                });
            }
        } else {
            for (value, members) in group_by(entities, source_depth) {
                let outcome = self.plan_tier(&members, source_depth)?;
                sources.push(SourceEntity {
                    id: value.to_string(),
                    image: self.naming.template(TierKey::new(&source_tier, value)),
                });
                upstream.push(outcome.terminal);
                child_chains.push(outcome.chains);
            }
        }

        let tier = TierContext {
            depth,
            template_tier,
            template_id,
            source_tier,
            sources,
        };

        let tasks = if self.naming.is_fixed() {
            self.emit_fixed_tier(&tier, &upstream)?
        } else {
            self.emit_bootstrap_tier(&tier, &upstream)?
        };

        let chains = if child_chains.is_empty() {
            tier.sources
                .iter()
                .zip(&tasks.composes)
                .map(|(source, compose)| LeafChain {
                    tier: tier.source_tier.clone(),
                    id: source.id.clone(),
                    image: source.image.clone(),
                    fields: vec![self.composed_field(&tier, source)],
                    tasks: vec![*compose],
                })
                .collect()
        } else {
            let mut chains = Vec::new();
            let below_each = tier.sources.iter().zip(&tasks.composes).zip(child_chains);
            for ((source, compose), below) in below_each {
                let field = self.composed_field(&tier, source);
                for mut chain in below {
                    chain.fields.push(field.clone());
                    chain.tasks.push(*compose);
                    chains.push(chain);
                }
            }
            chains
        };

        Ok(TierOutcome {
            terminal: tasks.terminal,
            chains,
        })
    }

    fn composed_field(&self, tier: &TierContext, source: &SourceEntity) -> String {
        self.naming
            .transform(tier.entity_key(source), WarpStage::Compose)
    }

    /// Dimension probes, each waiting on the child tier that produces its image
    fn emit_image_dims(
        &mut self,
        stages: &StageBuilder<'_>,
        tier: &TierContext,
        upstream: &[Vec<TaskRef>],
    ) -> Result<Vec<TaskRef>> {
        let mut dims = Vec::with_capacity(tier.sources.len());
        for (i, source) in tier.sources.iter().enumerate() {
            let parents = upstream.get(i).map(Vec::as_slice).unwrap_or_default();
            dims.push(self.add_after(stages.image_dim(source), parents)?);
        }
        Ok(dims)
    }

    // ========================================================================
    // Bootstrap tier
    // ========================================================================

    fn emit_bootstrap_tier(
        &mut self,
        tier: &TierContext,
        upstream: &[Vec<TaskRef>],
    ) -> Result<TierTasks> {
        let naming = self.naming.clone();
        let options = self.options.clone();
        let stages = StageBuilder::new(&naming, &options, tier);

        let dims = self.emit_image_dims(&stages, tier, upstream)?;
        let (built, mut target) = stages.create_template();
        let mut target_task = self.add_after(built, &dims)?;

        for i in 1..=options.rigid {
            let mut warps = Vec::with_capacity(tier.sources.len());
            for source in &tier.sources {
                let built = stages.rigid_warp(source, i, &target)?;
                warps.push(self.add_after(built, &[target_task])?);
            }
            let (built, mean) = stages.rigid_mean(i);
            target_task = self.add_after(built, &warps)?;
            target = mean;
        }
        debug!(tier = %tier.group_key(), iterations = options.rigid, "Rigid stage planned");

        for i in 1..=options.affine {
            let mut forwards = Vec::with_capacity(tier.sources.len());
            for source in &tier.sources {
                let built = stages.affine_warp_a(source, i, &target)?;
                forwards.push(self.add_after(built, &[target_task])?);
            }
            let (built, correction) = stages.affine_mean_a(i);
            let correction_task = self.add_after(built, &forwards)?;

            let mut warps = Vec::with_capacity(tier.sources.len());
            for source in &tier.sources {
                let built = stages.affine_warp_b(source, i, &target, Some(&correction))?;
                warps.push(self.add_after(built, &[correction_task])?);
            }
            let (built, mean) = stages.affine_mean_b(i);
            target_task = self.add_after(built, &warps)?;
            target = mean;
        }
        debug!(tier = %tier.group_key(), iterations = options.affine, "Affine stage planned");

        let mut fields = Vec::new();
        for i in 1..=options.diffeomorphic {
            fields.clear();
            for source in &tier.sources {
                let built = stages.diffeomorphic_warp(source, i, &target)?;
                fields.push(self.add_after(built, &[target_task])?);
            }
            let (built, mean) = stages.diffeomorphic_mean(i);
            target_task = self.add_after(built, &fields)?;
            target = mean;
        }
        debug!(
            tier = %tier.group_key(),
            iterations = options.diffeomorphic,
            "Diffeomorphic stage planned"
        );

        let mut composes = Vec::with_capacity(tier.sources.len());
        for (source, field) in tier.sources.iter().zip(&fields) {
            let built = stages.compose_warp(source, &target)?;
            composes.push(self.add_after(built, &[*field, target_task])?);
        }
        let (built, _) = stages.compose_mean();
        let template = self.add_after(built, &composes)?;

        Ok(TierTasks {
            composes,
            terminal: vec![template],
        })
    }

    // ========================================================================
    // Fixed-template tier
    // ========================================================================

    /// Every entity registers straight to the resampled fixed template; no
    /// group mean is computed, so each entity's chain is independent
    fn emit_fixed_tier(&mut self, tier: &TierContext, upstream: &[Vec<TaskRef>]) -> Result<TierTasks> {
        let naming = self.naming.clone();
        let options = self.options.clone();
        let stages = StageBuilder::new(&naming, &options, tier);

        let dims = self.emit_image_dims(&stages, tier, upstream)?;
        let (built, template) = stages.create_template();
        let template_task = self.add_after(built, &dims)?;

        let mut composes = Vec::with_capacity(tier.sources.len());
        for source in &tier.sources {
            let rigid = self.add_after(stages.rigid_warp(source, 1, &template)?, &[template_task])?;
            let forward = self.add_after(stages.affine_warp_a(source, 1, &template)?, &[rigid])?;
            let affine = self.add_after(
                stages.affine_warp_b(source, 1, &template, None)?,
                &[forward],
            )?;
            let field = self.add_after(
                stages.diffeomorphic_warp(source, 1, &template)?,
                &[affine],
            )?;
            composes.push(self.add_after(
                stages.compose_warp(source, &template)?,
                &[field, template_task],
            )?);
        }
        debug!(tier = %tier.group_key(), entities = composes.len(), "Fixed-template tier planned");

        Ok(TierTasks {
            terminal: composes.clone(),
            composes,
        })
    }

    // ========================================================================
    // Cross-tier composition
    // ========================================================================

    /// One end-to-end warp per leaf, composing every tier's field root first
    fn emit_full_warps(&mut self, chains: Vec<LeafChain>) -> Result<()> {
        let naming = self.naming.clone();
        for mut chain in chains {
            chain.fields.reverse();
            chain.tasks.reverse();
            let built = compose_full_warp(
                &naming,
                TierKey::new(&chain.tier, &chain.id),
                &chain.image,
                &chain.fields,
            );
            self.add_after(built, &chain.tasks)?;
        }
        debug!(
            leaves = self.graph.count(StageKind::ComposeFullWarp),
            "Full warps planned"
        );
        Ok(())
    }
}
