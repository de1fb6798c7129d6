//! Foliage viewer - flies over a noise terrain covered in streamed grass and clumps.

mod camera;
mod render;
mod terrain;

use bevy::prelude::*;
use bevy::window::WindowResolution;
use foliage::{
    layer_material, FieldSettings, FoliageField, FoliageLayer, FoliageManifest, FoliagePlugin, FoliageSystems,
    FoliageViewpoint, LayerProfile, LayerSettings, TerrainSource,
};
use serde::{Deserialize, Serialize};

use camera::FlyCamera;
use terrain::{NoiseTerrain, TerrainConfig, CLUMP_LAYER, GRASS_LAYER};

const VIEWER_MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/viewer.ron");
const FOLIAGE_MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/foliage.ron");

/// Shape used for a layer's instance mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceShape {
    /// Thin cone standing on its base.
    Blade,
    /// Squashed sphere.
    Clump,
}

/// How the viewer draws the foliage layer called `layer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerLook {
    pub layer: String,
    pub shape: InstanceShape,
    /// Tint of the layer's base material.
    pub color: (f32, f32, f32),
}

impl LayerLook {
    fn fallback(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            shape: InstanceShape::Blade,
            color: (0.30, 0.55, 0.18),
        }
    }
}

/// Viewer-only settings: the terrain and how each layer looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerManifest {
    pub terrain: TerrainConfig,
    pub looks: Vec<LayerLook>,
}

impl Default for ViewerManifest {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            looks: vec![
                LayerLook::fallback("grass"),
                LayerLook {
                    layer: "clumps".to_string(),
                    shape: InstanceShape::Clump,
                    color: (0.16, 0.36, 0.12),
                },
            ],
        }
    }
}

impl ViewerManifest {
    fn load(path: &str) -> foliage::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&text)?)
    }

    fn look(&self, layer: &str) -> LayerLook {
        self.looks
            .iter()
            .find(|look| look.layer == layer)
            .cloned()
            .unwrap_or_else(|| {
                warn!("No look for foliage layer '{layer}'; drawing it as grass blades");
                LayerLook::fallback(layer)
            })
    }
}

/// The scene used when `foliage.ron` is missing or invalid.
fn default_foliage() -> FoliageManifest {
    FoliageManifest {
        field: FieldSettings::default(),
        layers: vec![
            LayerSettings {
                name: "grass".to_string(),
                detail_layer: GRASS_LAYER,
                min_size: Vec3::new(0.8, 0.6, 0.8),
                max_size: Vec3::new(1.2, 1.6, 1.2),
                size_noise_scale: 4.0,
                profile: LayerProfile::GRASS,
                textures: Vec::new(),
            },
            LayerSettings {
                name: "clumps".to_string(),
                detail_layer: CLUMP_LAYER,
                min_size: Vec3::new(1.5, 1.0, 1.5),
                max_size: Vec3::new(3.0, 2.2, 3.0),
                size_noise_scale: 2.0,
                profile: LayerProfile::FOLIAGE,
                textures: Vec::new(),
            },
        ],
    }
}

fn load_manifests() -> (ViewerManifest, FoliageManifest) {
    let viewer = ViewerManifest::load(VIEWER_MANIFEST).unwrap_or_else(|e| {
        warn!("{VIEWER_MANIFEST}: {e}; using the built-in terrain");
        ViewerManifest::default()
    });
    let foliage = FoliageManifest::load(FOLIAGE_MANIFEST).unwrap_or_else(|e| {
        warn!("{FOLIAGE_MANIFEST}: {e}; using the built-in layers");
        default_foliage()
    });
    (viewer, foliage)
}

/// Marker for the status line.
#[derive(Component)]
struct StatusText;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Foliage Viewer".to_string(),
                resolution: WindowResolution::new(1280, 720),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(FoliagePlugin)
        .add_systems(Startup, (setup_scene, spawn_foliage))
        .add_systems(
            Update,
            (
                (camera::fly_camera, camera::foliage_controls, camera::draw_distance_controls).before(FoliageSystems),
                (render::render_foliage, update_status).after(FoliageSystems),
            ),
        )
        .run();
}

fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        FlyCamera::default(),
        FoliageViewpoint,
        Transform::from_xyz(128.0, 30.0, 128.0),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::OVERCAST_DAY,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(0.0, 1.0, 0.0).looking_at(Vec3::new(0.4, 0.0, 0.6), Vec3::Y),
    ));

    commands.spawn((
        Text::new(""),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(8.0),
            left: Val::Px(8.0),
            ..default()
        },
        StatusText,
    ));
}

fn spawn_foliage(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let (viewer, foliage) = load_manifests();

    let terrain = match NoiseTerrain::new(viewer.terrain.clone()) {
        Ok(terrain) => terrain,
        Err(e) => {
            error!("Terrain setup failed: {e}");
            return;
        }
    };

    commands.spawn((
        Mesh3d(meshes.add(terrain.build_mesh())),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::WHITE,
            perceptual_roughness: 0.9,
            metallic: 0.0,
            ..default()
        })),
        Transform::from_translation(terrain.origin()),
    ));

    let mut layers = Vec::with_capacity(foliage.layers.len());
    for settings in foliage.layers {
        let look = viewer.look(&settings.name);
        let mesh = match look.shape {
            InstanceShape::Blade => Mesh::from(Cone {
                radius: 0.06,
                height: 0.7,
            })
            .translated_by(Vec3::Y * 0.35),
            InstanceShape::Clump => Mesh::from(Sphere::new(0.5))
                .scaled_by(Vec3::new(1.0, 0.6, 1.0))
                .translated_by(Vec3::Y * 0.2),
        };
        let (r, g, b) = look.color;
        let base = StandardMaterial {
            base_color: Color::srgb(r, g, b),
            perceptual_roughness: 0.8,
            ..default()
        };
        let material = layer_material(&base, &settings.textures, |path| asset_server.load(path.to_owned()));

        match FoliageLayer::from_terrain(
            settings,
            Some(meshes.add(mesh)),
            Some(materials.add(material)),
            &terrain,
        ) {
            Ok(layer) => layers.push(layer),
            Err(e) => error!("Skipping foliage layer: {e}"),
        }
    }

    let snapshot = match terrain.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Terrain snapshot failed: {e}");
            return;
        }
    };

    match FoliageField::new(foliage.field, snapshot, layers) {
        Ok(field) => {
            commands.spawn(field);
        }
        Err(e) => error!("Foliage field setup failed: {e}"),
    }
    commands.insert_resource(terrain);
}

fn update_status(fields: Query<&FoliageField>, mut text: Query<&mut Text, With<StatusText>>) {
    let (Ok(field), Ok(mut text)) = (fields.single(), text.single_mut()) else {
        return;
    };

    let settings = field.settings();
    let mut status = format!(
        "density {:.2}  workers {}  draw {}  cycles {}\n",
        settings.density,
        settings.worker_count,
        if settings.draw { "on" } else { "off" },
        field.cycles()
    );
    for layer in field.layers() {
        let report = layer.last_report();
        status.push_str(&format!(
            "{}: {} chunks, {} instances, {} batches\n",
            layer.name(),
            report.live,
            report.instances,
            layer.visible().batches.len()
        ));
    }
    status.push_str("WASD/QE move, right mouse look, F draw, 1/2/3 workers, +/- density, [/] distance");
    text.0 = status;
}
