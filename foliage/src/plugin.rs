//! Bevy wiring: viewpoint tracking and per-frame generation driving.

use bevy::prelude::*;

use crate::field::FoliageField;

/// Marks the entity foliage streams around. Without one, the first 3D camera is used.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct FoliageViewpoint;

/// Systems that move the tracked point and collect/start generation cycles.
/// Renderers should run after this set.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FoliageSystems;

/// Plugin for streamed foliage on every [`FoliageField`] entity.
pub struct FoliagePlugin;

impl Plugin for FoliagePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (track_viewpoint, drive_generation)
                .chain()
                .in_set(FoliageSystems),
        );
    }
}

/// Copies the tracked entity's position into each field.
fn track_viewpoint(
    mut fields: Query<&mut FoliageField>,
    viewpoints: Query<&GlobalTransform, With<FoliageViewpoint>>,
    cameras: Query<&GlobalTransform, With<Camera3d>>,
    transforms: Query<&GlobalTransform>,
) {
    let fallback = viewpoints
        .iter()
        .next()
        .or_else(|| cameras.iter().next())
        .map(GlobalTransform::translation);

    for mut field in fields.iter_mut() {
        let tracked = field
            .tracking_override
            .and_then(|entity| transforms.get(entity).ok())
            .map(GlobalTransform::translation)
            .or(fallback);

        if let Some(position) = tracked {
            if field.tracked_position() != position {
                field.set_tracked_position(position);
            }
        }
    }
}

fn drive_generation(mut fields: Query<&mut FoliageField>) {
    for mut field in fields.iter_mut() {
        field.tick();
    }
}

#[cfg(test)]
mod tests {
    use bevy::tasks::{AsyncComputeTaskPool, TaskPool};

    use super::*;
    use crate::config::LayerProfile;
    use crate::field::FoliageLayer;
    use crate::test_support::{fixture, layer_settings};

    fn app_with_field() -> (App, Entity) {
        AsyncComputeTaskPool::get_or_init(TaskPool::new);
        let fixture = fixture();
        let layer = FoliageLayer::new(
            layer_settings(LayerProfile::GRASS),
            Some(Handle::default()),
            Some(Handle::default()),
            (*fixture.detail).clone(),
        )
        .unwrap();
        let field = FoliageField::new(fixture.settings.clone(), (*fixture.terrain).clone(), vec![layer]).unwrap();

        let mut app = App::new();
        app.add_plugins(FoliagePlugin);
        let entity = app.world_mut().spawn(field).id();
        (app, entity)
    }

    #[test]
    fn viewpoint_drives_the_tracked_position() {
        let (mut app, field) = app_with_field();
        app.world_mut().spawn((
            FoliageViewpoint,
            GlobalTransform::from(Transform::from_xyz(10.0, 2.0, 30.0)),
        ));

        app.update();
        let field = app.world().get::<FoliageField>(field).unwrap();
        assert_eq!(field.tracked_position(), Vec3::new(10.0, 2.0, 30.0));
        assert_eq!(field.cycles(), 1);
    }

    #[test]
    fn override_beats_the_viewpoint() {
        let (mut app, field) = app_with_field();
        app.world_mut().spawn((FoliageViewpoint, GlobalTransform::IDENTITY));
        let target = app
            .world_mut()
            .spawn(GlobalTransform::from(Transform::from_xyz(100.0, 0.0, 50.0)))
            .id();
        app.world_mut().get_mut::<FoliageField>(field).unwrap().tracking_override = Some(target);

        app.update();
        let field = app.world().get::<FoliageField>(field).unwrap();
        assert_eq!(field.tracked_position(), Vec3::new(100.0, 0.0, 50.0));
    }
}
