//! Foliage layers and the field component that drives their generation cycles.

use std::sync::Arc;

use bevy::prelude::*;

use crate::batch::BatchSet;
use crate::config::{check_density, FieldSettings, LayerSettings};
use crate::cycle::{FieldCycle, LayerCycle};
use crate::dispatch::ThreadScaling;
use crate::error::{FoliageError, Result};
use crate::material::check_bindings;
use crate::publish::BatchSlots;
use crate::streaming::{run_generation_cycle, ChunkStreamer, CycleReport, LayerJob, LayerOutcome};
use crate::terrain::{DetailMap, TerrainSnapshot, TerrainSource};
use crate::worker::{GenerationWorker, WorkerPanic, WorkerStatus};

/// One instanced draw handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct BatchDraw<'a> {
    /// Index of the layer within its field.
    pub layer: usize,
    /// Cycle that produced the batch.
    pub cycle: u64,
    pub mesh: &'a Handle<Mesh>,
    pub material: &'a Handle<StandardMaterial>,
    pub transforms: &'a [Mat4],
}

/// Render collaborator: receives one call per published batch per frame.
pub trait InstanceSink {
    fn draw_instanced(&mut self, draw: BatchDraw<'_>);
}

/// One species of instances with its own detail map, grid and batches.
pub struct FoliageLayer {
    settings: LayerSettings,
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
    detail: Arc<DetailMap>,
    /// `None` while the layer's grid is out on the worker.
    streamer: Option<ChunkStreamer>,
    slots: BatchSlots,
    report: CycleReport,
}

impl FoliageLayer {
    pub fn new(
        settings: LayerSettings,
        mesh: Option<Handle<Mesh>>,
        material: Option<Handle<StandardMaterial>>,
        detail: DetailMap,
    ) -> Result<Self> {
        let mesh = mesh.ok_or_else(|| FoliageError::MissingMesh {
            layer: settings.name.clone(),
        })?;
        let material = material.ok_or_else(|| FoliageError::MissingMaterial {
            layer: settings.name.clone(),
        })?;
        check_bindings(&settings.name, &settings.textures)?;

        Ok(Self {
            settings,
            mesh,
            material,
            detail: Arc::new(detail),
            streamer: Some(ChunkStreamer::new()),
            slots: BatchSlots::default(),
            report: CycleReport::default(),
        })
    }

    /// Builds a layer from the terrain's detail layer named in `settings`.
    pub fn from_terrain(
        settings: LayerSettings,
        mesh: Option<Handle<Mesh>>,
        material: Option<Handle<StandardMaterial>>,
        terrain: &impl TerrainSource,
    ) -> Result<Self> {
        let detail = terrain
            .detail_layer(settings.detail_layer)
            .ok_or(FoliageError::MissingDetailLayer(settings.detail_layer))?;
        Self::new(settings, mesh, material, detail)
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// The last published batches.
    pub fn visible(&self) -> Arc<BatchSet> {
        self.slots.visible()
    }

    pub fn last_report(&self) -> CycleReport {
        self.report
    }

    /// The layer's grid, unless a cycle currently owns it.
    pub fn streamer(&self) -> Option<&ChunkStreamer> {
        self.streamer.as_ref()
    }
}

/// A terrain's foliage: settings, layers and the background generation worker.
///
/// Call [`FoliageField::tick`] once per frame; [`crate::FoliagePlugin`] does this for
/// every field entity.
#[derive(Component)]
pub struct FoliageField {
    settings: FieldSettings,
    terrain: Arc<TerrainSnapshot>,
    layers: Vec<FoliageLayer>,
    tracked: Vec3,
    /// Entity to track instead of the viewpoint.
    pub tracking_override: Option<Entity>,
    worker: GenerationWorker<Vec<LayerOutcome>>,
    cycles: u64,
}

impl FoliageField {
    pub fn new(settings: FieldSettings, terrain: TerrainSnapshot, layers: Vec<FoliageLayer>) -> Result<Self> {
        settings.validate()?;
        info!(
            "Foliage field ready: {} layers over {:?} terrain, density {}",
            layers.len(),
            terrain.size,
            settings.density
        );
        Ok(Self {
            settings,
            terrain: Arc::new(terrain),
            layers,
            tracked: Vec3::ZERO,
            tracking_override: None,
            worker: GenerationWorker::new(),
            cycles: 0,
        })
    }

    pub fn settings(&self) -> &FieldSettings {
        &self.settings
    }

    pub fn layers(&self) -> &[FoliageLayer] {
        &self.layers
    }

    pub fn terrain(&self) -> &TerrainSnapshot {
        &self.terrain
    }

    pub fn status(&self) -> WorkerStatus {
        self.worker.status()
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn tracked_position(&self) -> Vec3 {
        self.tracked
    }

    /// World position the next cycle streams around.
    pub fn set_tracked_position(&mut self, world: Vec3) {
        self.tracked = world;
    }

    /// Replaces the terrain snapshot; picked up by the next cycle.
    pub fn set_terrain(&mut self, terrain: TerrainSnapshot) {
        self.terrain = Arc::new(terrain);
    }

    pub fn set_density(&mut self, density: f32) -> Result<()> {
        check_density(density)?;
        self.settings.density = density;
        Ok(())
    }

    pub fn set_worker_count(&mut self, knob: u8) -> Result<ThreadScaling> {
        let scaling = ThreadScaling::try_from(knob)?;
        self.settings.worker_count = knob;
        Ok(scaling)
    }

    pub fn draw(&self) -> bool {
        self.settings.draw
    }

    /// Suspends or resumes drawing; generation keeps running either way.
    pub fn set_draw(&mut self, draw: bool) {
        self.settings.draw = draw;
    }

    /// Per-frame step: publish a finished cycle, then start the next one if idle.
    pub fn tick(&mut self) {
        self.collect();
        if self.worker.status() == WorkerStatus::Idle {
            if let Err(err) = self.start_cycle() {
                error!("Foliage cycle could not start: {err}");
            }
        }
    }

    /// Publishes the worker's result if it has finished.
    pub fn collect(&mut self) -> bool {
        match self.worker.try_take() {
            Some(Ok(outcomes)) => {
                self.apply(outcomes);
                true
            }
            Some(Err(panic)) => {
                self.recover(panic);
                true
            }
            None => false,
        }
    }

    /// Starts a cycle on the async compute pool. Returns `false` if one is running.
    pub fn start_cycle(&mut self) -> Result<bool> {
        self.start_cycle_with(run_generation_cycle)
    }

    fn start_cycle_with(&mut self, run: fn(Vec<LayerJob>, u64) -> Vec<LayerOutcome>) -> Result<bool> {
        if self.worker.status() != WorkerStatus::Idle {
            return Ok(false);
        }
        let jobs = self.prepare_jobs()?;
        self.cycles += 1;
        let cycle = self.cycles;
        Ok(self.worker.start(move || run(jobs, cycle)))
    }

    /// Runs a whole cycle on the calling thread and publishes it.
    pub fn run_cycle_blocking(&mut self) -> Result<bool> {
        if self.worker.status() != WorkerStatus::Idle {
            return Ok(false);
        }
        let jobs = self.prepare_jobs()?;
        self.cycles += 1;
        let outcomes = run_generation_cycle(jobs, self.cycles);
        self.apply(outcomes);
        Ok(true)
    }

    /// Waits for the in-flight cycle, if any, and drops its result.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
        for layer in &mut self.layers {
            layer.streamer.get_or_insert_with(ChunkStreamer::new);
        }
    }

    /// Hands every published batch to `sink`, unless drawing is suspended.
    pub fn submit(&self, sink: &mut impl InstanceSink) {
        if !self.settings.draw {
            return;
        }
        for (index, layer) in self.layers.iter().enumerate() {
            let set = layer.slots.visible();
            for batch in &set.batches {
                sink.draw_instanced(BatchDraw {
                    layer: index,
                    cycle: set.cycle,
                    mesh: &layer.mesh,
                    material: &layer.material,
                    transforms: batch.transforms(),
                });
            }
        }
    }

    fn prepare_jobs(&mut self) -> Result<Vec<LayerJob>> {
        let field = Arc::new(FieldCycle::capture(&self.settings, self.terrain.clone(), self.tracked)?);
        Ok(self
            .layers
            .iter_mut()
            .map(|layer| LayerJob {
                cycle: LayerCycle::new(field.clone(), &layer.settings, layer.detail.clone()),
                streamer: layer.streamer.take().unwrap_or_default(),
            })
            .collect())
    }

    fn apply(&mut self, outcomes: Vec<LayerOutcome>) {
        for (layer, outcome) in self.layers.iter_mut().zip(outcomes) {
            if outcome.report.reallocated {
                debug!("Foliage layer '{}' grid reallocated", layer.settings.name);
            }
            layer.streamer = Some(outcome.streamer);
            layer.slots.publish(outcome.batches);
            layer.report = outcome.report;
        }
    }

    /// A failed cycle loses its grids; the layers restart empty and keep their
    /// last published batches until the next cycle completes.
    fn recover(&mut self, panic: WorkerPanic) {
        error!("Foliage cycle {} failed: {panic}", self.cycles);
        for layer in &mut self.layers {
            layer.streamer = Some(ChunkStreamer::new());
        }
    }
}
