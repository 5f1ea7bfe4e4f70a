//! Shader program plus its named attribute and uniform slots.
//!
//! A [`Material`] compiles one program and resolves every name it will need
//! up front, so a missing attribute surfaces at construction instead of as a
//! silent no-op draw. Texture binding always goes through sampler unit 0.

use crate::gl::{GlContext, GlError, ProgramId, ShaderDialect, ShaderSource, TextureId, UniformLocation};
use crate::math::Mat4;

/// Projection-view matrix uniform.
pub const PROJ_VIEW_UNIFORM: &str = "u_projView";
/// Sampler uniform bound to texture unit 0.
pub const TEXTURE_UNIFORM: &str = "u_texture";

/// Attribute names of the sprite batch program, static quad index first.
pub const SPRITE_ATTRIBUTES: [&str; 7] = ["index", "position", "size", "angle", "region", "color", "effect"];

const SPRITE_BATCH_VERT: &str = include_str!("shaders/sprite_batch.vert");
const SPRITE_BATCH_FRAG: &str = include_str!("shaders/sprite_batch.frag");
const SPRITE_BATCH_WGSL: &str = include_str!("shaders/sprite_batch.wgsl");

/// A compiled program with resolved binding slots.
#[derive(Debug, Clone)]
pub struct Material {
    program: ProgramId,
    attributes: Vec<(String, u32)>,
    uniforms: Vec<(String, UniformLocation)>,
}

impl Material {
    /// Compile `source` and resolve every listed attribute and uniform.
    pub fn new<G: GlContext>(
        gl: &mut G,
        source: &ShaderSource<'_>,
        attributes: &[&str],
        uniforms: &[&str],
    ) -> Result<Self, GlError> {
        let program = gl.create_program(source)?;

        let attributes = attributes
            .iter()
            .map(|&name| {
                gl.attrib_location(program, name)
                    .map(|loc| (name.to_owned(), loc))
                    .ok_or_else(|| GlError::MissingAttribute(name.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let uniforms = uniforms
            .iter()
            .map(|&name| {
                gl.uniform_location(program, name)
                    .map(|loc| (name.to_owned(), loc))
                    .ok_or_else(|| GlError::MissingUniform(name.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("material compiled: {} attributes, {} uniforms", attributes.len(), uniforms.len());

        Ok(Self { program, attributes, uniforms })
    }

    /// The instanced sprite batch program in whichever dialect `gl` speaks.
    pub fn sprite_batch<G: GlContext>(gl: &mut G) -> Result<Self, GlError> {
        let source = match gl.dialect() {
            ShaderDialect::Glsl => ShaderSource::Glsl {
                vertex: SPRITE_BATCH_VERT,
                fragment: SPRITE_BATCH_FRAG,
            },
            ShaderDialect::Wgsl => ShaderSource::Wgsl(SPRITE_BATCH_WGSL),
        };
        Self::new(gl, &source, &SPRITE_ATTRIBUTES, &[PROJ_VIEW_UNIFORM, TEXTURE_UNIFORM])
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, loc)| *loc)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.iter().find(|(n, _)| n == name).map(|(_, loc)| *loc)
    }

    pub fn bind<G: GlContext>(&self, gl: &mut G) {
        gl.use_program(Some(self.program));
    }

    /// Bind `texture` to unit 0 and point the sampler uniform at it.
    pub fn set_texture<G: GlContext>(&self, gl: &mut G, texture: TextureId) -> Result<(), GlError> {
        let location = self
            .uniform(TEXTURE_UNIFORM)
            .ok_or_else(|| GlError::MissingUniform(TEXTURE_UNIFORM.to_owned()))?;
        gl.bind_texture(0, Some(texture));
        gl.uniform_sampler(location, 0);
        Ok(())
    }

    pub fn set_projection<G: GlContext>(&self, gl: &mut G, projection: &Mat4) -> Result<(), GlError> {
        let location = self
            .uniform(PROJ_VIEW_UNIFORM)
            .ok_or_else(|| GlError::MissingUniform(PROJ_VIEW_UNIFORM.to_owned()))?;
        gl.uniform_matrix4(location, projection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCall, RecordingGl, TextureDesc};

    #[test]
    fn sprite_batch_resolves_all_slots() {
        let mut gl = RecordingGl::new();
        let material = Material::sprite_batch(&mut gl).unwrap();
        for name in SPRITE_ATTRIBUTES {
            assert!(material.attribute(name).is_some(), "attribute '{name}'");
        }
        assert!(material.uniform(PROJ_VIEW_UNIFORM).is_some());
        assert!(material.uniform(TEXTURE_UNIFORM).is_some());
    }

    #[test]
    fn missing_attribute_fails_construction() {
        let mut gl = RecordingGl::new();
        gl.hide_name("region");
        let err = Material::sprite_batch(&mut gl).unwrap_err();
        assert_eq!(err, GlError::MissingAttribute("region".into()));
    }

    #[test]
    fn compile_failure_propagates() {
        let mut gl = RecordingGl::new();
        gl.fail_next_compile("syntax error");
        let err = Material::sprite_batch(&mut gl).unwrap_err();
        assert_eq!(err, GlError::ShaderCompile("syntax error".into()));
    }

    #[test]
    fn set_texture_uses_unit_zero() {
        let mut gl = RecordingGl::new();
        let material = Material::sprite_batch(&mut gl).unwrap();
        let texture = gl.create_texture(&TextureDesc::for_size(1, 1), &[0; 4]).unwrap();
        material.bind(&mut gl);
        material.set_texture(&mut gl, texture).unwrap();

        let calls = gl.take_calls();
        assert!(calls.contains(&GlCall::BindTexture { unit: 0, texture: Some(texture) }));
        assert!(calls.iter().any(|c| matches!(c, GlCall::UniformSampler { unit: 0, .. })));
    }

    #[test]
    fn wgsl_backends_get_wgsl_source() {
        let mut gl = RecordingGl::with_dialect(ShaderDialect::Wgsl);
        assert!(Material::sprite_batch(&mut gl).is_ok());
    }
}
