//! Per-layer texture bindings applied onto a shared base material.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FoliageError, Result};

/// Texture slot of a [`StandardMaterial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    MetallicRoughness,
    Occlusion,
    Emissive,
}

impl TextureSlot {
    /// Replaces the slot's texture on `material`.
    pub fn bind(self, material: &mut StandardMaterial, image: Handle<Image>) {
        let slot = match self {
            TextureSlot::BaseColor => &mut material.base_color_texture,
            TextureSlot::Normal => &mut material.normal_map_texture,
            TextureSlot::MetallicRoughness => &mut material.metallic_roughness_texture,
            TextureSlot::Occlusion => &mut material.occlusion_texture,
            TextureSlot::Emissive => &mut material.emissive_texture,
        };
        *slot = Some(image);
    }
}

/// One texture asset bound to a slot of the layer's material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureBinding {
    pub slot: TextureSlot,
    /// Asset path, resolved by the host's asset loader.
    pub path: String,
}

/// Rejects bindings that name the same slot twice.
pub fn check_bindings(layer: &str, bindings: &[TextureBinding]) -> Result<()> {
    for (i, binding) in bindings.iter().enumerate() {
        if bindings[..i].iter().any(|b| b.slot == binding.slot) {
            return Err(FoliageError::DuplicateTextureSlot {
                layer: layer.to_string(),
                slot: binding.slot,
            });
        }
    }
    Ok(())
}

/// Clones `base` and binds every texture, loading each path through `load`.
///
/// Slots without a binding keep whatever `base` has.
pub fn layer_material(
    base: &StandardMaterial,
    bindings: &[TextureBinding],
    mut load: impl FnMut(&str) -> Handle<Image>,
) -> StandardMaterial {
    let mut material = base.clone();
    for binding in bindings {
        binding.slot.bind(&mut material, load(&binding.path));
    }
    material
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(slot: TextureSlot, path: &str) -> TextureBinding {
        TextureBinding {
            slot,
            path: path.to_string(),
        }
    }

    #[test]
    fn bindings_fill_their_slots_on_a_copy() {
        let base = StandardMaterial {
            base_color: Color::srgb(0.2, 0.5, 0.1),
            ..default()
        };
        let mut loaded = Vec::new();
        let material = layer_material(
            &base,
            &[
                binding(TextureSlot::BaseColor, "textures/blade.png"),
                binding(TextureSlot::Normal, "textures/blade_normal.png"),
            ],
            |path| {
                loaded.push(path.to_string());
                Handle::default()
            },
        );

        assert_eq!(loaded, ["textures/blade.png", "textures/blade_normal.png"]);
        assert!(material.base_color_texture.is_some());
        assert!(material.normal_map_texture.is_some());
        assert!(material.occlusion_texture.is_none());
        assert_eq!(material.base_color, base.base_color);
        assert!(base.base_color_texture.is_none());
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let bindings = [
            binding(TextureSlot::Emissive, "a.png"),
            binding(TextureSlot::BaseColor, "b.png"),
            binding(TextureSlot::Emissive, "c.png"),
        ];
        assert!(matches!(
            check_bindings("grass", &bindings),
            Err(FoliageError::DuplicateTextureSlot {
                slot: TextureSlot::Emissive,
                ..
            })
        ));
        assert!(check_bindings("grass", &bindings[..2]).is_ok());
    }
}
