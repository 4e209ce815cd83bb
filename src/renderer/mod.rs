pub mod batch_compositor;
pub mod batch_renderer;
pub mod device;
pub mod drawable_processor;
pub mod light_accumulator;
pub mod light_processor;
pub mod lights;
pub mod pipeline_batch;
pub mod pipeline_state;
pub mod scene_pass;
pub mod scene_processor;
pub mod shadow_atlas;
pub mod shadow_split;

pub use batch_compositor::{BatchCompositor, ShadowSplitBatches, SortedBatches};
pub use batch_renderer::{BatchRenderStats, BatchRenderer};
pub use device::{DeviceCapabilities, DrawCommand, GraphicsDevice, HeadlessDevice, PassTarget, PipelineStateId, TextureId};
pub use drawable_processor::{
    drawable_light_penalty, DrawableProcessor, DrawableProcessorSettings, DrawableUpdateFlags, FrameInfo,
    GeometryRenderFlags,
};
pub use light_accumulator::{LightAccumulator, LightAccumulatorContext, LightDataForAccumulator};
pub use light_processor::{LightProcessor, LightProcessorCache, LightProcessorCallback, LightProcessorContext};
pub use lights::{CookedLightParams, LightShaderParamsRaw};
pub use pipeline_batch::{PipelineBatch, PipelineBatchBackToFront, PipelineBatchByState, PipelineBatchGroup};
pub use pipeline_state::{PipelineStateCache, PipelineStateDesc};
pub use scene_pass::{AddBatchResult, GeometryBatch, ScenePass, ScenePassFlags, ScenePassKind};
pub use scene_processor::{RenderPipelineStats, SceneProcessor};
pub use shadow_atlas::ShadowAtlas;
pub use shadow_split::{calculate_view_size, ShadowMapRegion, ShadowSplitProcessor};
