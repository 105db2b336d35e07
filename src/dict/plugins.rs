//! Plugin-to-element table and per-element parameter whitelists.

/// XML element name a plugin is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Scene,
    Ref,
    Shape,
    Bsdf,
    Texture,
    Emitter,
    Sensor,
    Integrator,
    Sampler,
    Film,
    Medium,
    Phase,
    Volume,
    Subsurface,
    Rfilter,
}

impl ElementKind {
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Scene => "scene",
            ElementKind::Ref => "ref",
            ElementKind::Shape => "shape",
            ElementKind::Bsdf => "bsdf",
            ElementKind::Texture => "texture",
            ElementKind::Emitter => "emitter",
            ElementKind::Sensor => "sensor",
            ElementKind::Integrator => "integrator",
            ElementKind::Sampler => "sampler",
            ElementKind::Film => "film",
            ElementKind::Medium => "medium",
            ElementKind::Phase => "phase",
            ElementKind::Volume => "volume",
            ElementKind::Subsurface => "subsurface",
            ElementKind::Rfilter => "rfilter",
        }
    }

    /// Whether nested children are written without a `name` attribute.
    pub fn has_unnamed_children(self) -> bool {
        matches!(self, ElementKind::Scene)
    }

    /// Scalar parameters this element kind accepts.
    pub fn allowed_params(self) -> &'static [&'static str] {
        match self {
            ElementKind::Scene | ElementKind::Ref => &[],
            ElementKind::Shape => SHAPE_PARAMS,
            ElementKind::Bsdf => BSDF_PARAMS,
            ElementKind::Texture => TEXTURE_PARAMS,
            ElementKind::Emitter => EMITTER_PARAMS,
            ElementKind::Sensor => SENSOR_PARAMS,
            ElementKind::Integrator => INTEGRATOR_PARAMS,
            ElementKind::Sampler => SAMPLER_PARAMS,
            ElementKind::Film => FILM_PARAMS,
            ElementKind::Medium => MEDIUM_PARAMS,
            ElementKind::Phase => PHASE_PARAMS,
            ElementKind::Volume => VOLUME_PARAMS,
            ElementKind::Subsurface => SUBSURFACE_PARAMS,
            ElementKind::Rfilter => RFILTER_PARAMS,
        }
    }
}

/// Look up the element kind for a plugin type.
pub fn element_kind(plugin: &str) -> Option<ElementKind> {
    use ElementKind::*;
    let kind = match plugin {
        "scene" => Scene,
        "ref" => Ref,

        "serialized" | "obj" | "ply" | "sphere" | "cube" | "rectangle" | "disk" | "cylinder"
        | "hair" | "heightfield" | "shapegroup" | "instance" => Shape,

        "diffuse" | "roughdiffuse" | "dielectric" | "thindielectric" | "roughdielectric"
        | "conductor" | "roughconductor" | "plastic" | "roughplastic" | "coating"
        | "roughcoating" | "bumpmap" | "phong" | "ward" | "mixturebsdf" | "blendbsdf"
        | "mask" | "twosided" | "difftrans" | "hk" | "irawan" | "null" => Bsdf,

        "bitmap" | "checkerboard" | "gridtexture" | "scale" | "vertexcolors" | "wireframe"
        | "curvature" => Texture,

        "point" | "area" | "spot" | "directional" | "collimated" | "sky" | "sun" | "sunsky"
        | "envmap" | "constant" => Emitter,

        "perspective" | "thinlens" | "orthographic" | "telecentric" | "spherical"
        | "irradiancemeter" | "radiancemeter" | "fluencemeter" => Sensor,

        "ao" | "direct" | "path" | "volpath" | "volpath_simple" | "bdpt" | "photonmapper"
        | "ppm" | "sppm" | "pssmlt" | "mlt" | "erpt" | "ptracer" | "adaptive" | "irrcache"
        | "multichannel" | "field" => Integrator,

        "independent" | "stratified" | "ldsampler" | "halton" | "hammersley" | "sobol" => {
            Sampler
        }

        "hdrfilm" | "tiledhdrfilm" | "ldrfilm" | "mfilm" => Film,

        "box" | "tent" | "gaussian" | "mitchell" | "catmullrom" | "lanczos" => Rfilter,

        "homogeneous" | "heterogeneous" => Medium,

        "isotropic" | "hg" | "rayleigh" | "kkay" | "microflake" | "mixturephase" => Phase,

        "constvolume" | "gridvolume" | "volcache" => Volume,

        "dipole" | "singlescatter" => Subsurface,

        _ => return None,
    };
    Some(kind)
}

/// Whether `param` may be written on elements of `kind`.
pub fn is_allowed_param(kind: ElementKind, param: &str) -> bool {
    kind.allowed_params().contains(&param)
}

const SHAPE_PARAMS: &[&str] = &[
    "filename", "shapeIndex", "faceNormals", "maxSmoothAngle", "flipNormals", "flipTexCoords",
    "toWorld", "center", "radius", "p0", "p1", "width", "angleThreshold", "reduceMemory",
    "shadingSamples", "scale",
];

const BSDF_PARAMS: &[&str] = &[
    "reflectance", "transmittance", "diffuseReflectance", "specularReflectance",
    "specularTransmittance", "alpha", "alphaU", "alphaV", "distribution", "intIOR", "extIOR",
    "material", "eta", "k", "nonlinear", "thickness", "sigmaA", "exponent", "weight",
    "weights", "opacity", "useFastApprox", "sampleVisible", "kd", "ks", "variant",
    "sigmaS", "albedo", "sigmaT", "scale", "filename", "repeatU", "repeatV",
];

const TEXTURE_PARAMS: &[&str] = &[
    "filename", "wrapMode", "wrapModeU", "wrapModeV", "gamma", "filterType",
    "maxAnisotropy", "cache", "uoffset", "voffset", "uscale", "vscale", "channel",
    "color0", "color1", "lineWidth", "interiorColor", "edgeColor", "stepWidth", "scale",
    "curvature",
];

const EMITTER_PARAMS: &[&str] = &[
    "toWorld", "position", "direction", "intensity", "radiance", "irradiance", "power",
    "cutoffAngle", "beamWidth", "samplingWeight", "filename", "scale", "gamma", "turbidity",
    "albedo", "year", "month", "day", "hour", "minute", "second", "latitude", "longitude",
    "timezone", "sunDirection", "stretch", "resolution", "sunScale", "skyScale",
    "sunRadiusScale", "cache",
];

const SENSOR_PARAMS: &[&str] = &[
    "toWorld", "fov", "fovAxis", "focalLength", "nearClip", "farClip", "focusDistance",
    "apertureRadius", "shutterOpen", "shutterClose",
];

const INTEGRATOR_PARAMS: &[&str] = &[
    "maxDepth", "rrDepth", "strictNormals", "hideEmitters", "shadingSamples", "rayLength",
    "emitterSamples", "bsdfSamples", "lightImage", "sampleDirect", "directSamples",
    "glossySamples", "globalPhotons", "causticPhotons", "volumePhotons",
    "globalLookupRadius", "causticLookupRadius", "lookupSize", "granularity", "photonCount",
    "initialRadius", "alpha", "maxPasses", "bidirectional", "twoStage", "pLarge",
    "luminanceSamples", "numChains", "maxChains", "chainLength", "field", "undefined",
    "maxError", "pValue", "maxSampleFactor", "resolution", "quality", "qualityAdjustment",
];

const SAMPLER_PARAMS: &[&str] = &["sampleCount", "dimension", "scramble"];

const FILM_PARAMS: &[&str] = &[
    "width", "height", "fileFormat", "pixelFormat", "componentFormat", "cropOffsetX",
    "cropOffsetY", "cropWidth", "cropHeight", "attachLog", "banner", "highQualityEdges",
    "gamma", "exposure", "tonemapMethod", "key", "burn", "variable", "digits",
];

const RFILTER_PARAMS: &[&str] = &["stddev", "B", "C", "lobes"];

const MEDIUM_PARAMS: &[&str] = &[
    "material", "sigmaA", "sigmaS", "sigmaT", "albedo", "scale", "stepSize", "densityMultiplier",
];

const PHASE_PARAMS: &[&str] = &["g", "stddev", "weights"];

const VOLUME_PARAMS: &[&str] = &[
    "value", "filename", "sendData", "toWorld", "min", "max", "blockSize", "voxelWidth",
    "memoryLimit",
];

const SUBSURFACE_PARAMS: &[&str] = &[
    "material", "sigmaA", "sigmaS", "sigmaT", "albedo", "scale", "intIOR", "extIOR", "irrSamples",
    "g", "fastSingleScatter", "fssSamples", "singleScatterShadowRays",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kinds() {
        assert_eq!(element_kind("serialized"), Some(ElementKind::Shape));
        assert_eq!(element_kind("roughplastic"), Some(ElementKind::Bsdf));
        assert_eq!(element_kind("hdrfilm"), Some(ElementKind::Film));
        assert_eq!(element_kind("gaussian").map(ElementKind::tag), Some("rfilter"));
        assert_eq!(element_kind("ref"), Some(ElementKind::Ref));
        assert_eq!(element_kind("principled_v2"), None);
    }

    #[test]
    fn test_whitelists() {
        assert!(is_allowed_param(ElementKind::Bsdf, "reflectance"));
        assert!(is_allowed_param(ElementKind::Shape, "shapeIndex"));
        assert!(!is_allowed_param(ElementKind::Sampler, "reflectance"));
        assert!(!is_allowed_param(ElementKind::Scene, "anything"));
    }
}
