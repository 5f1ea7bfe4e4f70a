//! Headless [`GlContext`] that records every call.
//!
//! Used by the test suite and the headless demo. It tracks just enough GL state
//! to behave like a real context: the bound buffer receives uploads, the
//! texture bound to unit 0 is captured with each draw, and misuse (uploading
//! with no buffer bound, drawing with no program) queues the same error a
//! WebGL context would.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{
    BufferId, BufferUsage, GlContext, GlError, ProgramId, ShaderDialect, ShaderSource,
    TextureDesc, TextureId, UniformLocation,
};
use crate::math::{Color, Mat4};

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateBuffer(BufferId),
    BindBuffer(Option<BufferId>),
    BufferData { buffer: BufferId, data: Vec<u8>, usage: BufferUsage },
    CreateProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    EnableAttrib(u32),
    DisableAttrib(u32),
    AttribPointer { location: u32, buffer: Option<BufferId>, components: u32, stride: u32, offset: u32 },
    AttribDivisor { location: u32, divisor: u32 },
    CreateTexture { texture: TextureId, desc: TextureDesc },
    BindTexture { unit: u32, texture: Option<TextureId> },
    UniformMatrix4 { location: UniformLocation, matrix: Mat4 },
    UniformSampler { location: UniformLocation, unit: i32 },
    ClearColor(Color),
    Clear,
    Viewport { x: u32, y: u32, width: u32, height: u32 },
    DrawArraysInstanced(DrawRecord),
    DrawArrays(DrawRecord),
}

/// A recorded draw plus the texture bound to unit 0 at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRecord {
    pub first: u32,
    pub count: u32,
    /// Always 1 for a plain `draw_arrays`.
    pub instances: u32,
    pub texture: Option<TextureId>,
}

/// Recording backend. See the module docs.
pub struct RecordingGl {
    dialect: ShaderDialect,
    calls: Vec<GlCall>,
    next_id: u32,
    bound_buffer: Option<BufferId>,
    buffers: HashMap<BufferId, Vec<u8>>,
    current_program: Option<ProgramId>,
    programs: HashMap<ProgramId, ProgramNames>,
    textures: HashMap<TextureId, TextureDesc>,
    texture_units: HashMap<u32, TextureId>,
    errors: VecDeque<GlError>,
    /// Names reported as inactive by `attrib_location` / `uniform_location`.
    missing: HashSet<String>,
    compile_failure: Option<String>,
    /// Errors raised by the next upload or draw, in place of recording it.
    upload_failure: Option<GlError>,
    draw_failure: Option<GlError>,
}

#[derive(Default)]
struct ProgramNames {
    attribs: HashMap<String, u32>,
    uniforms: HashMap<String, UniformLocation>,
}

impl RecordingGl {
    pub fn new() -> Self {
        Self::with_dialect(ShaderDialect::Glsl)
    }

    pub fn with_dialect(dialect: ShaderDialect) -> Self {
        Self {
            dialect,
            calls: Vec::new(),
            next_id: 1,
            bound_buffer: None,
            buffers: HashMap::new(),
            current_program: None,
            programs: HashMap::new(),
            textures: HashMap::new(),
            texture_units: HashMap::new(),
            errors: VecDeque::new(),
            missing: HashSet::new(),
            compile_failure: None,
            upload_failure: None,
            draw_failure: None,
        }
    }

    /// Every call since construction (or the last [`take_calls`](Self::take_calls)).
    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    /// Recorded draws, in order.
    pub fn draw_calls(&self) -> Vec<DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GlCall::DrawArraysInstanced(draw) | GlCall::DrawArrays(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    /// Every `buffer_data` upload with the given usage, in order.
    pub fn uploads(&self, usage: BufferUsage) -> Vec<&[u8]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GlCall::BufferData { data, usage: u, .. } if *u == usage => Some(data.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Current contents of `buffer` reinterpreted as `f32`s.
    pub fn buffer_floats(&self, buffer: BufferId) -> Option<Vec<f32>> {
        self.buffers
            .get(&buffer)
            .map(|bytes| bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned::<f32>).collect())
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture)
    }

    /// Queue an error for the next [`get_error`](GlContext::get_error).
    pub fn inject_error(&mut self, error: GlError) {
        self.errors.push_back(error);
    }

    /// Report `name` as an inactive attribute/uniform in every program.
    pub fn hide_name(&mut self, name: &str) {
        self.missing.insert(name.to_owned());
    }

    /// Make the next `create_program` fail with `message`.
    pub fn fail_next_compile(&mut self, message: &str) {
        self.compile_failure = Some(message.to_owned());
    }

    /// Make the next `buffer_data` fail with `error` instead of uploading.
    pub fn fail_next_upload(&mut self, error: GlError) {
        self.upload_failure = Some(error);
    }

    /// Make the next draw (instanced or not) fail with `error` instead of drawing.
    pub fn fail_next_draw(&mut self, error: GlError) {
        self.draw_failure = Some(error);
    }

    fn record_draw(&mut self, draw: DrawRecord, instanced: bool) {
        if self.current_program.is_none() {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        }
        if let Some(error) = self.draw_failure.take() {
            self.errors.push_back(error);
            return;
        }
        let draw = DrawRecord { texture: self.texture_units.get(&0).copied(), ..draw };
        self.calls.push(if instanced { GlCall::DrawArraysInstanced(draw) } else { GlCall::DrawArrays(draw) });
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for RecordingGl {
    fn default() -> Self {
        Self::new()
    }
}

impl GlContext for RecordingGl {
    fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn create_buffer(&mut self) -> Result<BufferId, GlError> {
        let id = BufferId(self.alloc_id());
        self.buffers.insert(id, Vec::new());
        self.calls.push(GlCall::CreateBuffer(id));
        Ok(id)
    }

    fn bind_buffer(&mut self, buffer: Option<BufferId>) {
        if let Some(id) = buffer {
            if !self.buffers.contains_key(&id) {
                self.errors.push_back(GlError::InvalidOperation);
                return;
            }
        }
        self.bound_buffer = buffer;
        self.calls.push(GlCall::BindBuffer(buffer));
    }

    fn buffer_data(&mut self, data: &[u8], usage: BufferUsage) {
        let Some(buffer) = self.bound_buffer else {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        };
        if let Some(error) = self.upload_failure.take() {
            self.errors.push_back(error);
            return;
        }
        self.buffers.insert(buffer, data.to_vec());
        self.calls.push(GlCall::BufferData { buffer, data: data.to_vec(), usage });
    }

    fn create_program(&mut self, source: &ShaderSource<'_>) -> Result<ProgramId, GlError> {
        if let Some(message) = self.compile_failure.take() {
            return Err(GlError::ShaderCompile(message));
        }
        if source.dialect() != self.dialect {
            return Err(GlError::ShaderCompile(format!(
                "expected {:?} source, got {:?}",
                self.dialect,
                source.dialect()
            )));
        }
        let id = ProgramId(self.alloc_id());
        self.programs.insert(id, ProgramNames::default());
        self.calls.push(GlCall::CreateProgram(id));
        Ok(id)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.calls.push(GlCall::UseProgram(program));
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        if self.missing.contains(name) {
            return None;
        }
        let names = self.programs.get_mut(&program)?;
        let next = names.attribs.len() as u32;
        Some(*names.attribs.entry(name.to_owned()).or_insert(next))
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if self.missing.contains(name) {
            return None;
        }
        let names = self.programs.get_mut(&program)?;
        let next = UniformLocation(names.uniforms.len() as u32);
        Some(*names.uniforms.entry(name.to_owned()).or_insert(next))
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        self.calls.push(GlCall::EnableAttrib(location));
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        self.calls.push(GlCall::DisableAttrib(location));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32) {
        if !(1..=4).contains(&components) {
            self.errors.push_back(GlError::InvalidValue);
            return;
        }
        self.calls.push(GlCall::AttribPointer {
            location,
            buffer: self.bound_buffer,
            components,
            stride,
            offset,
        });
    }

    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        self.calls.push(GlCall::AttribDivisor { location, divisor });
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, GlError> {
        if desc.width == 0 || desc.height == 0 || pixels.len() != desc.byte_len() {
            return Err(GlError::InvalidValue);
        }
        let texture = TextureId(self.alloc_id());
        self.textures.insert(texture, *desc);
        self.calls.push(GlCall::CreateTexture { texture, desc: *desc });
        Ok(texture)
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => {
                self.texture_units.insert(unit, id);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
        self.calls.push(GlCall::BindTexture { unit, texture });
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, matrix: &Mat4) {
        if self.current_program.is_none() {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        }
        self.calls.push(GlCall::UniformMatrix4 { location, matrix: *matrix });
    }

    fn uniform_sampler(&mut self, location: UniformLocation, unit: i32) {
        if self.current_program.is_none() {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        }
        self.calls.push(GlCall::UniformSampler { location, unit });
    }

    fn clear_color(&mut self, color: Color) {
        self.calls.push(GlCall::ClearColor(color));
    }

    fn clear(&mut self) {
        self.calls.push(GlCall::Clear);
    }

    fn viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.calls.push(GlCall::Viewport { x, y, width, height });
    }

    fn draw_arrays_instanced(&mut self, first: u32, count: u32, instances: u32) {
        self.record_draw(DrawRecord { first, count, instances, texture: None }, true);
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        self.record_draw(DrawRecord { first, count, instances: 1, texture: None }, false);
    }

    fn get_error(&mut self) -> Option<GlError> {
        self.errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLSL: ShaderSource<'static> = ShaderSource::Glsl { vertex: "void main(){}", fragment: "void main(){}" };

    #[test]
    fn upload_goes_to_bound_buffer() {
        let mut gl = RecordingGl::new();
        let buffer = gl.create_buffer().unwrap();
        gl.bind_buffer(Some(buffer));
        gl.buffer_data(bytemuck::cast_slice(&[1.0f32, 2.0]), BufferUsage::Dynamic);
        assert_eq!(gl.buffer_floats(buffer), Some(vec![1.0, 2.0]));
        assert_eq!(gl.get_error(), None);
    }

    #[test]
    fn upload_without_bound_buffer_is_invalid_operation() {
        let mut gl = RecordingGl::new();
        gl.buffer_data(&[0, 0, 0, 0], BufferUsage::Static);
        assert_eq!(gl.get_error(), Some(GlError::InvalidOperation));
        assert_eq!(gl.get_error(), None, "errors drain one at a time");
    }

    #[test]
    fn draw_captures_unit_zero_texture() {
        let mut gl = RecordingGl::new();
        let program = gl.create_program(&GLSL).unwrap();
        let texture = gl.create_texture(&TextureDesc::for_size(1, 1), &[255; 4]).unwrap();
        gl.use_program(Some(program));
        gl.bind_texture(0, Some(texture));
        gl.draw_arrays_instanced(0, 6, 3);
        assert_eq!(
            gl.draw_calls(),
            vec![DrawRecord { first: 0, count: 6, instances: 3, texture: Some(texture) }]
        );
    }

    #[test]
    fn draw_without_program_records_error() {
        let mut gl = RecordingGl::new();
        gl.draw_arrays_instanced(0, 6, 1);
        assert!(gl.draw_calls().is_empty());
        assert_eq!(gl.get_error(), Some(GlError::InvalidOperation));
    }

    #[test]
    fn plain_draw_is_recorded_with_one_instance() {
        let mut gl = RecordingGl::new();
        let program = gl.create_program(&GLSL).unwrap();
        gl.use_program(Some(program));
        gl.draw_arrays(0, 12);
        assert_eq!(gl.draw_calls(), vec![DrawRecord { first: 0, count: 12, instances: 1, texture: None }]);
        assert!(matches!(gl.calls().last(), Some(GlCall::DrawArrays(_))));
    }

    #[test]
    fn failing_draw_and_upload_queue_the_error_once() {
        let mut gl = RecordingGl::new();
        let program = gl.create_program(&GLSL).unwrap();
        let buffer = gl.create_buffer().unwrap();
        gl.use_program(Some(program));
        gl.bind_buffer(Some(buffer));

        gl.fail_next_upload(GlError::OutOfMemory);
        gl.buffer_data(&[1, 2, 3, 4], BufferUsage::Dynamic);
        assert_eq!(gl.get_error(), Some(GlError::OutOfMemory));
        assert!(gl.uploads(BufferUsage::Dynamic).is_empty());
        gl.buffer_data(&[1, 2, 3, 4], BufferUsage::Dynamic);
        assert_eq!(gl.uploads(BufferUsage::Dynamic).len(), 1);

        gl.fail_next_draw(GlError::InvalidOperation);
        gl.draw_arrays_instanced(0, 6, 2);
        assert_eq!(gl.get_error(), Some(GlError::InvalidOperation));
        assert!(gl.draw_calls().is_empty());
        gl.draw_arrays(0, 6);
        assert_eq!(gl.draw_calls().len(), 1);
        assert_eq!(gl.get_error(), None);
    }

    #[test]
    fn locations_are_stable_per_name() {
        let mut gl = RecordingGl::new();
        let program = gl.create_program(&GLSL).unwrap();
        let a = gl.attrib_location(program, "position");
        let b = gl.attrib_location(program, "size");
        assert_eq!(a, Some(0));
        assert_eq!(b, Some(1));
        assert_eq!(gl.attrib_location(program, "position"), a);
        gl.hide_name("effect");
        assert_eq!(gl.attrib_location(program, "effect"), None);
    }

    #[test]
    fn compile_rejects_wrong_dialect() {
        let mut gl = RecordingGl::with_dialect(ShaderDialect::Wgsl);
        assert!(matches!(gl.create_program(&GLSL), Err(GlError::ShaderCompile(_))));
    }

    #[test]
    fn texture_size_mismatch_is_invalid_value() {
        let mut gl = RecordingGl::new();
        let result = gl.create_texture(&TextureDesc::for_size(2, 2), &[0; 4]);
        assert_eq!(result, Err(GlError::InvalidValue));
    }
}
