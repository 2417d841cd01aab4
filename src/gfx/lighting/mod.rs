pub mod light;
pub mod probe;
pub mod registry;
pub mod shadow_caster;

pub use light::{Light, LightKind, LightType, ShadowBias};
pub use probe::ReflectionProbe;
pub use registry::{LightRegistry, MAX_LIGHTS_PER_KIND, MAX_REFLECTION_PROBES};
pub use shadow_caster::{
    FrustumPlanes, LightSpace, ProjectionKind, ShadowCaster, ShadowTarget, MAX_SHADOW_RESOLUTION,
    SHADOW_DEPTH_FORMAT,
};
