use std::path::Path;
use std::rc::Rc;

use super::cache::ResourceCache;
use crate::error::AssetError;
use crate::gfx::geometry::{generate_cube, generate_plane, generate_sphere};
use crate::gfx::scene::{Material, Mesh, Model};

pub const BUILTIN_CUBE: &str = "builtin:cube";
pub const BUILTIN_SPHERE: &str = "builtin:sphere";
pub const BUILTIN_PLANE: &str = "builtin:plane";

/// Loads models by path and hands out shared handles to them.
///
/// Paths starting with `builtin:` resolve to procedural primitives instead
/// of files.
#[derive(Default)]
pub struct AssetManager {
    models: ResourceCache<Model>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_model(&mut self, path: &str) -> Result<Rc<Model>, AssetError> {
        self.models.get_or_try_load(path, || {
            let model = match path {
                BUILTIN_CUBE => Model::from_geometry("Cube", &generate_cube(1.0), Material::default()),
                BUILTIN_SPHERE => {
                    Model::from_geometry("Sphere", &generate_sphere(1.0, 32, 16), Material::default())
                }
                BUILTIN_PLANE => {
                    Model::from_geometry("Plane", &generate_plane(10.0, 10.0, 1, 1), Material::default())
                }
                _ => load_obj(path)?,
            };
            log::info!("Loaded model '{}' ({} meshes)", path, model.meshes().len());
            Ok(model)
        })
    }

    pub fn cached_model(&self, path: &str) -> Option<Rc<Model>> {
        self.models.get(path)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

/// Metallic-roughness approximation of an MTL material.
fn material_from_mtl(mtl: &tobj::Material) -> Material {
    let diffuse = mtl.diffuse.unwrap_or([0.8, 0.8, 0.8]);
    Material {
        base_color: [diffuse[0], diffuse[1], diffuse[2], mtl.dissolve.unwrap_or(1.0)],
        metallic: 0.0,
        roughness: 1.0 - (mtl.shininess.unwrap_or(32.0) / 128.0).clamp(0.0, 1.0),
    }
}

fn load_obj(path: &str) -> Result<Model, AssetError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| AssetError::ModelLoad {
        path: path.to_owned(),
        source,
    })?;

    let materials = materials.unwrap_or_else(|err| {
        log::debug!("No usable MTL for '{}': {}", path, err);
        Vec::new()
    });

    let meshes: Vec<Mesh> = models
        .iter()
        .filter(|m| !m.mesh.positions.is_empty() && !m.mesh.indices.is_empty())
        .map(|m| Mesh::from_flat(&m.mesh.positions, &m.mesh.normals, m.mesh.indices.clone()))
        .collect();
    if meshes.is_empty() {
        return Err(AssetError::EmptyModel(path.to_owned()));
    }

    let material = models
        .iter()
        .find_map(|m| m.mesh.material_id)
        .and_then(|id| materials.get(id))
        .map(material_from_mtl)
        .unwrap_or_default();

    let name = Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned());
    Ok(Model::new(name, meshes, material))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_models_are_cached() {
        let mut assets = AssetManager::new();
        let cube = assets.load_model(BUILTIN_CUBE).unwrap();
        let again = assets.load_model(BUILTIN_CUBE).unwrap();

        assert!(Rc::ptr_eq(&cube, &again));
        assert_eq!(cube.name(), "Cube");
        assert_eq!(cube.bounds().max.x, 1.0);
        assert_eq!(assets.model_count(), 1);
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let mut assets = AssetManager::new();
        let result = assets.load_model("does/not/exist.obj");
        assert!(matches!(result, Err(AssetError::ModelLoad { .. })));
        assert!(assets.cached_model("does/not/exist.obj").is_none());
    }

    #[test]
    fn test_loads_obj_with_generated_normals() {
        let dir = std::env::temp_dir().join("trellis_asset_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quad.obj");
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 1 0 -1\nv 0 0 -1\nf 1 2 3 4\n",
        )
        .unwrap();

        let mut assets = AssetManager::new();
        let model = assets.load_model(path.to_str().unwrap()).unwrap();

        assert_eq!(model.name(), "quad");
        let mesh = &model.meshes()[0];
        assert_eq!(mesh.index_count(), 6);
        assert!(mesh.vertices().iter().all(|v| (v.normal[1] - 1.0).abs() < 1e-5));
    }
}
