//! # Sprite Batch — Many Rectangles, Few Draw Calls
//!
//! The [`SpriteBatch`] turns a stream of "draw this textured rectangle"
//! requests into as few instanced draw calls as the GPU constraints allow.
//! Each request becomes one [`InstanceRecord`] in a fixed-capacity slot array;
//! a *flush* uploads the filled slots and issues one `drawArraysInstanced` of
//! six vertices times the number of records.
//!
//! ## Lifecycle
//!
//! ```text
//!            begin()                     end()
//!   Idle ─────────────► Recording ─────────────► Idle
//!                        │    ▲
//!            draw_*()    │    │  flush() when the window is full
//!                        ▼    │  or the texture changes
//!                     slots[0..pending]
//! ```
//!
//! ## Flush Boundaries
//!
//! A draw call can only sample one bound texture and can only reference the
//! records uploaded for it. So a flush happens:
//!
//! 1. when `pending == capacity` and another sprite arrives,
//! 2. when a sprite's texture differs from the pending run's texture,
//! 3. at `end()`.
//!
//! With one texture and `n` sprites this yields `ceil(n / capacity)` draws,
//! with or without instancing. Slots are reused in place after every flush,
//! so the CPU buffer never grows.
//!
//! ## Instancing Off
//!
//! With [`BatchConfig::instancing`] off, a flush expands the pending records
//! into six [`ExpandedVertex`]es each, points every attribute at that buffer
//! with divisor 0 and issues `draw_arrays(0, 6 * pending)`. Boundaries and
//! error checks are unchanged.
//!
//! ## Per-Flush GL Sequence
//!
//! ```text
//! get_error()                              ── stale error? fatal
//! bind quad buffer, index ptr, divisor 0   ── 6 corner indices
//! bind instance buffer, buffer_data(..)    ── pending records only
//! 6 attrib pointers, divisor 1             ── position..effect
//! bind texture unit 0, set uniforms
//! draw_arrays_instanced(0, 6, pending)
//! get_error()                              ── upload/draw failed? fatal
//! ```
//!
//! ## Comparison
//!
//! - **libGDX `SpriteBatch`**: Same begin/draw/end protocol and the same
//!   flush-on-texture-switch rule, but emits four vertices per sprite instead
//!   of one instance.
//! - **Love2D**: Automatic batching of consecutive same-texture draws, flushed
//!   implicitly by state changes. Similar boundaries, hidden API.

mod instance;

use std::fmt;

use bytemuck::Zeroable;

use crate::config::BatchConfig;
use crate::gl::{BufferId, BufferUsage, GlContext, GlError, TextureId};
use crate::material::Material;
use crate::math::{ortho_projection, Color, Mat4, Region};
use crate::sprite::Sprite;

pub use instance::{
    expand_into, ExpandedVertex, InstanceAttribute, InstanceRecord, COMPONENT_COUNT, INSTANCE_ATTRIBUTES,
    QUAD_INDICES, STRIDE, VERTEX_RECORD_OFFSET, VERTEX_STRIDE,
};

/// Depth written for draws that don't come from a [`Sprite`].
pub const DEFAULT_DEPTH: f32 = 1.0;

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors returned by [`SpriteBatch`] operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// A draw or `end()` was issued outside `begin()`/`end()`.
    NotRecording,
    /// `begin()` was called twice without `end()`.
    AlreadyRecording,
    /// The GPU reported an error around a flush. Fatal for the session.
    Gpu(GlError),
    /// A batch must hold at least one instance.
    InvalidCapacity,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::NotRecording => write!(f, "call SpriteBatch::begin() before drawing"),
            BatchError::AlreadyRecording => write!(f, "SpriteBatch::begin() called while already recording"),
            BatchError::Gpu(e) => write!(f, "GPU error during sprite batch flush: {e}"),
            BatchError::InvalidCapacity => write!(f, "sprite batch capacity must be greater than zero"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GlError> for BatchError {
    fn from(e: GlError) -> Self {
        BatchError::Gpu(e)
    }
}

// ── SpriteBatch ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Idle,
    Recording,
}

/// Per-frame counters, reset by `begin()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub draw_calls: u32,
    pub instances: u32,
    pub capacity: usize,
}

/// Instanced sprite batch. See the module docs.
pub struct SpriteBatch {
    config: BatchConfig,
    material: Material,
    index_location: u32,
    instance_locations: [u32; 6],
    quad_buffer: BufferId,
    instance_buffer: BufferId,
    records: Vec<InstanceRecord>,
    /// Scratch for the non-instanced path, empty when instancing is on.
    vertices: Vec<ExpandedVertex>,
    pending: usize,
    pending_texture: Option<TextureId>,
    color: Color,
    projection: Mat4,
    state: BatchState,
    draw_calls: u32,
    instances: u32,
}

impl SpriteBatch {
    /// Compile the batch program, upload the static quad and allocate
    /// `config.capacity` instance slots. The projection starts as identity
    /// until the first [`resize`](Self::resize).
    pub fn new<G: GlContext>(gl: &mut G, config: BatchConfig) -> Result<Self, BatchError> {
        if config.capacity == 0 {
            return Err(BatchError::InvalidCapacity);
        }

        let material = Material::sprite_batch(gl)?;
        let index_location = material
            .attribute("index")
            .ok_or_else(|| GlError::MissingAttribute("index".into()))?;
        let mut instance_locations = [0u32; 6];
        for (slot, attr) in instance_locations.iter_mut().zip(INSTANCE_ATTRIBUTES.iter()) {
            *slot = material
                .attribute(attr.name)
                .ok_or_else(|| GlError::MissingAttribute(attr.name.into()))?;
        }

        let quad_buffer = gl.create_buffer()?;
        gl.bind_buffer(Some(quad_buffer));
        gl.buffer_data(bytemuck::cast_slice(&QUAD_INDICES), BufferUsage::Static);

        let instance_buffer = gl.create_buffer()?;
        gl.bind_buffer(None);

        if let Some(err) = gl.get_error() {
            log::error!("sprite batch setup failed: {err}");
            return Err(BatchError::Gpu(err));
        }

        log::info!(
            "sprite batch ready: capacity {}, instancing {}",
            config.capacity,
            if config.instancing { "on" } else { "off" }
        );

        let vertex_slots = if config.instancing { 0 } else { config.capacity * QUAD_INDICES.len() };
        Ok(Self {
            records: vec![InstanceRecord::zeroed(); config.capacity],
            vertices: Vec::with_capacity(vertex_slots),
            config,
            material,
            index_location,
            instance_locations,
            quad_buffer,
            instance_buffer,
            pending: 0,
            pending_texture: None,
            color: Color::WHITE,
            projection: Mat4::IDENTITY,
            state: BatchState::Idle,
            draw_calls: 0,
            instances: 0,
        })
    }

    /// Start a frame: bind the program and enable the instancing attributes.
    pub fn begin<G: GlContext>(&mut self, gl: &mut G) -> Result<(), BatchError> {
        if self.state == BatchState::Recording {
            return Err(BatchError::AlreadyRecording);
        }
        self.state = BatchState::Recording;
        self.pending = 0;
        self.pending_texture = None;
        self.draw_calls = 0;
        self.instances = 0;

        self.material.bind(gl);
        gl.enable_vertex_attrib(self.index_location);
        for &location in &self.instance_locations {
            gl.enable_vertex_attrib(location);
        }
        Ok(())
    }

    /// Queue one textured rectangle. `region = None` samples the whole
    /// texture; `color = None` uses the color from [`set_color`](Self::set_color).
    #[allow(clippy::too_many_arguments)]
    pub fn draw_region<G: GlContext>(
        &mut self,
        gl: &mut G,
        texture: TextureId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        region: Option<Region>,
        color: Option<Color>,
    ) -> Result<(), BatchError> {
        let record = InstanceRecord::new(
            x,
            y,
            DEFAULT_DEPTH,
            width,
            height,
            region.unwrap_or(Region::FULL),
            color.unwrap_or(self.color),
        );
        self.push(gl, texture, record)
    }

    /// Queue a rectangle covering the whole texture in the default color.
    pub fn draw<G: GlContext>(
        &mut self,
        gl: &mut G,
        texture: TextureId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), BatchError> {
        self.draw_region(gl, texture, x, y, width, height, None, None)
    }

    /// Queue a sprite with its own region, color, depth and angle.
    pub fn draw_sprite<G: GlContext>(&mut self, gl: &mut G, sprite: &Sprite) -> Result<(), BatchError> {
        let mut record = InstanceRecord::new(
            sprite.position.x,
            sprite.position.y,
            sprite.depth,
            sprite.size.x,
            sprite.size.y,
            sprite.region,
            sprite.color,
        );
        record.angle = sprite.angle;
        self.push(gl, sprite.texture, record)
    }

    fn push<G: GlContext>(
        &mut self,
        gl: &mut G,
        texture: TextureId,
        mut record: InstanceRecord,
    ) -> Result<(), BatchError> {
        if self.state != BatchState::Recording {
            return Err(BatchError::NotRecording);
        }

        let texture_changed = self.pending_texture.is_some_and(|t| t != texture);
        if self.pending > 0 && (self.pending == self.capacity() || texture_changed) {
            self.flush(gl)?;
        }

        if !self.config.atlas_regions {
            record.region = Region::FULL.to_array();
        }
        if !self.config.tint {
            record.color = Color::WHITE.to_array();
        }

        self.records[self.pending] = record;
        self.pending += 1;
        self.pending_texture = Some(texture);
        Ok(())
    }

    /// Upload the pending records and issue one draw. No-op when nothing is
    /// pending.
    pub fn flush<G: GlContext>(&mut self, gl: &mut G) -> Result<(), BatchError> {
        let Some(texture) = self.pending_texture.filter(|_| self.pending > 0) else {
            return Ok(());
        };

        if let Some(err) = gl.get_error() {
            return Err(self.abort(gl, err));
        }

        if self.config.instancing {
            self.upload_instanced(gl);
        } else {
            self.upload_expanded(gl);
        }

        let uniforms = self
            .material
            .set_texture(gl, texture)
            .and_then(|()| self.material.set_projection(gl, &self.projection));
        if let Err(err) = uniforms {
            return Err(self.abort(gl, err));
        }

        let corners = QUAD_INDICES.len() as u32;
        if self.config.instancing {
            gl.draw_arrays_instanced(0, corners, self.pending as u32);
        } else {
            gl.draw_arrays(0, corners * self.pending as u32);
        }

        if let Some(err) = gl.get_error() {
            return Err(self.abort(gl, err));
        }

        log::trace!("flush: {} instances", self.pending);
        self.draw_calls += 1;
        self.instances += self.pending as u32;
        self.pending = 0;
        self.pending_texture = None;
        Ok(())
    }

    fn upload_instanced<G: GlContext>(&self, gl: &mut G) {
        gl.bind_buffer(Some(self.quad_buffer));
        gl.vertex_attrib_pointer(self.index_location, 1, std::mem::size_of::<f32>() as u32, 0);
        gl.vertex_attrib_divisor(self.index_location, 0);

        gl.bind_buffer(Some(self.instance_buffer));
        gl.buffer_data(bytemuck::cast_slice(&self.records[..self.pending]), BufferUsage::Dynamic);
        for (&location, attr) in self.instance_locations.iter().zip(INSTANCE_ATTRIBUTES.iter()) {
            gl.vertex_attrib_pointer(location, attr.components, STRIDE, attr.offset);
            gl.vertex_attrib_divisor(location, 1);
        }
    }

    fn upload_expanded<G: GlContext>(&mut self, gl: &mut G) {
        self.vertices.clear();
        for record in &self.records[..self.pending] {
            expand_into(record, &mut self.vertices);
        }

        gl.bind_buffer(Some(self.instance_buffer));
        gl.buffer_data(bytemuck::cast_slice(&self.vertices), BufferUsage::Dynamic);
        gl.vertex_attrib_pointer(self.index_location, 1, VERTEX_STRIDE, 0);
        gl.vertex_attrib_divisor(self.index_location, 0);
        for (&location, attr) in self.instance_locations.iter().zip(INSTANCE_ATTRIBUTES.iter()) {
            gl.vertex_attrib_pointer(location, attr.components, VERTEX_STRIDE, VERTEX_RECORD_OFFSET + attr.offset);
            gl.vertex_attrib_divisor(location, 0);
        }
    }

    /// Flush the remainder and disable the batch attributes.
    pub fn end<G: GlContext>(&mut self, gl: &mut G) -> Result<(), BatchError> {
        if self.state != BatchState::Recording {
            return Err(BatchError::NotRecording);
        }
        self.flush(gl)?;
        self.state = BatchState::Idle;
        self.disable_attributes(gl);
        Ok(())
    }

    fn disable_attributes<G: GlContext>(&self, gl: &mut G) {
        gl.disable_vertex_attrib(self.index_location);
        for &location in &self.instance_locations {
            gl.disable_vertex_attrib(location);
        }
    }

    /// Drop the pending run and leave the batch idle with its attributes
    /// disabled, as `end()` would.
    fn abort<G: GlContext>(&mut self, gl: &mut G, err: GlError) -> BatchError {
        log::error!("sprite batch flush failed: {err}");
        self.state = BatchState::Idle;
        self.pending = 0;
        self.pending_texture = None;
        self.disable_attributes(gl);
        BatchError::Gpu(err)
    }

    /// Recompute the top-left-origin orthographic projection.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.projection = ortho_projection(width, height);
    }

    /// Default tint for draws without an explicit color.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_recording(&self) -> bool {
        self.state == BatchState::Recording
    }

    /// Draw calls issued since the last `begin()`.
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats {
            draw_calls: self.draw_calls,
            instances: self.instances,
            capacity: self.capacity(),
        }
    }

    /// The buffer receiving per-instance records.
    pub fn instance_buffer(&self) -> BufferId {
        self.instance_buffer
    }
}
