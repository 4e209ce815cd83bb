// scene/mod.rs

pub mod builder;
pub mod camera;
pub mod components;
pub mod drawable;
pub(crate) mod internal;
pub mod light;
pub mod material;
pub mod query;
pub mod scene;
pub mod transform;

// Re-export commonly used types
pub use builder::EntityBuilder;
pub use camera::Camera;
pub use drawable::{Drawable, DrawableData, DrawableIndex, SourceBatch};
pub use light::{
    BiasParameters, CascadeParameters, FocusParameters, Light, LightData, LightId, LightImportance,
    LightType, MAX_CASCADE_SPLITS,
};
pub use material::{BlendMode, GeometryId, Material, MaterialId, MaterialLibrary, MaterialPass, PassId, Technique};
pub use query::{LightIndex, OcclusionBuffer, SpatialQuery};
pub use scene::{Scene, SceneSnapshot};
pub use transform::Transform;

pub use components::{Name, OrbitAnimation, RotateAnimation, TransformComponent, Visible};
