//! Render collaborator: one entity per published instance.
//!
//! Each field layer gets a root entity holding the instances of its current cycle.
//! Bevy batches the identical mesh/material pairs into instanced draws. A root is
//! rebuilt only when its layer publishes a new cycle.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
use foliage::{BatchDraw, FoliageField, InstanceSink};

/// Root of one layer's spawned instances.
#[derive(Component, Debug)]
pub struct LayerRoot {
    pub field: Entity,
    pub layer: usize,
    pub cycle: u64,
}

/// Instances of a newly published cycle, waiting to be spawned.
struct PendingLayer {
    cycle: u64,
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
    transforms: Vec<Mat4>,
}

/// Collects a frame's draws for one field.
struct EntitySink<'a> {
    spawned: &'a HashMap<usize, u64>,
    drawn: HashSet<usize>,
    pending: HashMap<usize, PendingLayer>,
}

impl InstanceSink for EntitySink<'_> {
    fn draw_instanced(&mut self, draw: BatchDraw<'_>) {
        self.drawn.insert(draw.layer);
        if self.spawned.get(&draw.layer) == Some(&draw.cycle) {
            return;
        }
        self.pending
            .entry(draw.layer)
            .or_insert_with(|| PendingLayer {
                cycle: draw.cycle,
                mesh: draw.mesh.clone(),
                material: draw.material.clone(),
                transforms: Vec::new(),
            })
            .transforms
            .extend_from_slice(draw.transforms);
    }
}

/// Mirrors every field's published batches into instance entities.
pub fn render_foliage(
    mut commands: Commands,
    fields: Query<(Entity, &FoliageField)>,
    mut roots: Query<(Entity, &LayerRoot, &mut Visibility)>,
) {
    for (field_entity, field) in fields.iter() {
        let spawned: HashMap<usize, u64> = roots
            .iter()
            .filter(|(_, root, _)| root.field == field_entity)
            .map(|(_, root, _)| (root.layer, root.cycle))
            .collect();

        let mut sink = EntitySink {
            spawned: &spawned,
            drawn: HashSet::new(),
            pending: HashMap::new(),
        };
        field.submit(&mut sink);
        let EntitySink { drawn, pending, .. } = sink;

        for (entity, root, mut visibility) in roots.iter_mut() {
            if root.field != field_entity {
                continue;
            }
            if pending.contains_key(&root.layer) {
                commands.entity(entity).despawn();
                continue;
            }
            let wanted = if drawn.contains(&root.layer) {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
            visibility.set_if_neq(wanted);
        }

        for (layer, batch) in pending {
            spawn_layer(&mut commands, field_entity, layer, batch);
        }
    }
}

fn spawn_layer(commands: &mut Commands, field: Entity, layer: usize, batch: PendingLayer) {
    let PendingLayer {
        cycle,
        mesh,
        material,
        transforms,
    } = batch;
    debug!("Spawning {} instances for layer {layer} (cycle {cycle})", transforms.len());

    let root = commands
        .spawn((
            LayerRoot { field, layer, cycle },
            Transform::default(),
            Visibility::default(),
        ))
        .id();

    commands.spawn_batch(transforms.into_iter().map(move |matrix| {
        (
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_matrix(matrix),
            ChildOf(root),
        )
    }));
}
