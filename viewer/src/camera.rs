//! Fly camera and foliage keyboard controls.

use std::f32::consts::FRAC_PI_2;

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use foliage::{FoliageField, TerrainSource};

use crate::terrain::NoiseTerrain;

/// Mouse look sensitivity (radians per pixel).
const MOUSE_SENSITIVITY: f32 = 0.003;
/// Density step for the +/- keys.
const DENSITY_STEP: f32 = 0.25;
/// Draw distance step for the [ and ] keys.
const DISTANCE_STEP: f32 = 10.0;

/// Free-flying camera state.
#[derive(Component, Debug, Clone)]
pub struct FlyCamera {
    pub yaw: f32,
    pub pitch: f32,
    /// Units per second; doubled while shift is held.
    pub speed: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: -0.3,
            speed: 12.0,
        }
    }
}

/// WASD moves, Q/E lowers/raises, right mouse button looks around.
pub fn fly_camera(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut cameras: Query<(&mut FlyCamera, &mut Transform)>,
) {
    let mut delta = Vec2::ZERO;
    for motion in mouse_motion.read() {
        delta += motion.delta;
    }

    let Ok((mut fly, mut transform)) = cameras.single_mut() else {
        return;
    };

    if mouse_button.pressed(MouseButton::Right) && delta != Vec2::ZERO {
        fly.yaw -= delta.x * MOUSE_SENSITIVITY;
        fly.pitch = (fly.pitch - delta.y * MOUSE_SENSITIVITY).clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01);
    }
    transform.rotation = Quat::from_euler(EulerRot::YXZ, fly.yaw, fly.pitch, 0.0);

    let mut direction = Vec3::ZERO;
    if keys.pressed(KeyCode::KeyW) {
        direction += *transform.forward();
    }
    if keys.pressed(KeyCode::KeyS) {
        direction -= *transform.forward();
    }
    if keys.pressed(KeyCode::KeyD) {
        direction += *transform.right();
    }
    if keys.pressed(KeyCode::KeyA) {
        direction -= *transform.right();
    }
    if keys.pressed(KeyCode::KeyE) {
        direction += Vec3::Y;
    }
    if keys.pressed(KeyCode::KeyQ) {
        direction -= Vec3::Y;
    }

    let boost = if keys.pressed(KeyCode::ShiftLeft) { 2.0 } else { 1.0 };
    transform.translation += direction.normalize_or_zero() * fly.speed * boost * time.delta_secs();
}

/// F toggles drawing, 1/2/3 set the worker knob, +/- change density.
pub fn foliage_controls(keys: Res<ButtonInput<KeyCode>>, mut fields: Query<&mut FoliageField>) {
    for mut field in fields.iter_mut() {
        if keys.just_pressed(KeyCode::KeyF) {
            let draw = !field.draw();
            field.set_draw(draw);
            info!("Foliage drawing {}", if draw { "on" } else { "off" });
        }

        for (key, knob) in [(KeyCode::Digit1, 1), (KeyCode::Digit2, 2), (KeyCode::Digit3, 3)] {
            if keys.just_pressed(key) {
                match field.set_worker_count(knob) {
                    Ok(scaling) => info!("Foliage workers: {knob} ({} slices)", scaling.slices()),
                    Err(err) => warn!("{err}"),
                }
            }
        }

        let mut density = field.settings().density;
        if keys.just_pressed(KeyCode::Equal) || keys.just_pressed(KeyCode::NumpadAdd) {
            density += DENSITY_STEP;
        }
        if keys.just_pressed(KeyCode::Minus) || keys.just_pressed(KeyCode::NumpadSubtract) {
            density -= DENSITY_STEP;
        }
        if density != field.settings().density {
            match field.set_density(density) {
                Ok(()) => info!("Foliage density: {density}"),
                Err(err) => warn!("{err}"),
            }
        }
    }
}

/// [ and ] shrink or grow the foliage draw distance.
pub fn draw_distance_controls(
    keys: Res<ButtonInput<KeyCode>>,
    terrain: Option<ResMut<NoiseTerrain>>,
    mut fields: Query<&mut FoliageField>,
) {
    let Some(mut terrain) = terrain else {
        return;
    };
    let step = if keys.just_pressed(KeyCode::BracketRight) {
        DISTANCE_STEP
    } else if keys.just_pressed(KeyCode::BracketLeft) {
        -DISTANCE_STEP
    } else {
        return;
    };

    let distance = terrain.detail_distance() + step;
    terrain.set_detail_distance(distance);
    match terrain.snapshot() {
        Ok(snapshot) => {
            for mut field in fields.iter_mut() {
                field.set_terrain(snapshot.clone());
            }
            info!("Foliage draw distance: {}", terrain.detail_distance());
        }
        Err(err) => warn!("{err}"),
    }
}
