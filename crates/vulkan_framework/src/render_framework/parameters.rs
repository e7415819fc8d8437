//! Named uniform parameters with std140 layout
//!
//! A [`ParametersList`] is a small uniform block described by name and type at
//! build time. Values are staged in CPU memory and copied into the per-frame
//! uniform buffer of whichever frame binds a material using the list next.

use ash::vk;
use std::sync::Mutex;

use super::{FrameworkError, FrameworkResult};
use crate::app::RenderTarget;
use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4};
use crate::vk_utils::{Buffer, MemoryLocation};

/// Types a parameter can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `uint`
    UInt,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `mat4`, column-major
    Mat4,
}

impl ParameterType {
    /// Size in bytes
    pub fn size(self) -> usize {
        match self {
            ParameterType::Float | ParameterType::Int | ParameterType::UInt => 4,
            ParameterType::Vec2 => 8,
            ParameterType::Vec3 => 12,
            ParameterType::Vec4 => 16,
            ParameterType::Mat4 => 64,
        }
    }

    /// std140 base alignment
    pub fn alignment(self) -> usize {
        match self {
            ParameterType::Float | ParameterType::Int | ParameterType::UInt => 4,
            ParameterType::Vec2 => 8,
            // vec3 aligns like vec4; a mat4 is an array of vec4 columns.
            ParameterType::Vec3 | ParameterType::Vec4 | ParameterType::Mat4 => 16,
        }
    }
}

/// A value for one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    /// `float`
    Float(f32),
    /// `int`
    Int(i32),
    /// `uint`
    UInt(u32),
    /// `vec2`
    Vec2([f32; 2]),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `mat4` as columns
    Mat4([[f32; 4]; 4]),
}

impl ParameterValue {
    /// Type this value can be assigned to
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::Float(_) => ParameterType::Float,
            ParameterValue::Int(_) => ParameterType::Int,
            ParameterValue::UInt(_) => ParameterType::UInt,
            ParameterValue::Vec2(_) => ParameterType::Vec2,
            ParameterValue::Vec3(_) => ParameterType::Vec3,
            ParameterValue::Vec4(_) => ParameterType::Vec4,
            ParameterValue::Mat4(_) => ParameterType::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            ParameterValue::Float(v) => bytemuck::bytes_of(v),
            ParameterValue::Int(v) => bytemuck::bytes_of(v),
            ParameterValue::UInt(v) => bytemuck::bytes_of(v),
            ParameterValue::Vec2(v) => bytemuck::bytes_of(v),
            ParameterValue::Vec3(v) => bytemuck::bytes_of(v),
            ParameterValue::Vec4(v) => bytemuck::bytes_of(v),
            ParameterValue::Mat4(v) => bytemuck::bytes_of(v),
        }
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        ParameterValue::UInt(v)
    }
}

impl From<[f32; 2]> for ParameterValue {
    fn from(v: [f32; 2]) -> Self {
        ParameterValue::Vec2(v)
    }
}

impl From<[f32; 3]> for ParameterValue {
    fn from(v: [f32; 3]) -> Self {
        ParameterValue::Vec3(v)
    }
}

impl From<[f32; 4]> for ParameterValue {
    fn from(v: [f32; 4]) -> Self {
        ParameterValue::Vec4(v)
    }
}

impl From<[[f32; 4]; 4]> for ParameterValue {
    fn from(v: [[f32; 4]; 4]) -> Self {
        ParameterValue::Mat4(v)
    }
}

impl From<Vec2> for ParameterValue {
    fn from(v: Vec2) -> Self {
        ParameterValue::Vec2([v.x, v.y])
    }
}

impl From<Vec3> for ParameterValue {
    fn from(v: Vec3) -> Self {
        ParameterValue::Vec3([v.x, v.y, v.z])
    }
}

impl From<Vec4> for ParameterValue {
    fn from(v: Vec4) -> Self {
        ParameterValue::Vec4([v.x, v.y, v.z, v.w])
    }
}

impl From<Mat4> for ParameterValue {
    fn from(m: Mat4) -> Self {
        ParameterValue::Mat4(m.to_cols_array())
    }
}

/// Where one parameter lives in the block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSlot {
    /// Declared name
    pub name: String,
    /// Declared type
    pub ty: ParameterType,
    /// Byte offset from the start of the block
    pub offset: usize,
}

/// std140 layout of a parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    slots: Vec<ParameterSlot>,
    size: usize,
}

fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) / alignment * alignment
}

impl ParameterLayout {
    /// Lay out parameters in declaration order; names must be unique
    pub fn std140(parameters: &[(String, ParameterType)]) -> FrameworkResult<Self> {
        let mut slots: Vec<ParameterSlot> = Vec::with_capacity(parameters.len());
        let mut offset = 0;

        for (name, ty) in parameters {
            if slots.iter().any(|slot| &slot.name == name) {
                return Err(FrameworkError::DuplicateParameter(name.clone()));
            }
            offset = align_up(offset, ty.alignment());
            slots.push(ParameterSlot {
                name: name.clone(),
                ty: *ty,
                offset,
            });
            offset += ty.size();
        }

        // A uniform block occupies whole vec4s.
        Ok(Self {
            slots,
            size: align_up(offset, 16),
        })
    }

    /// Total block size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots in declaration order
    pub fn slots(&self) -> &[ParameterSlot] {
        &self.slots
    }

    /// Slot for `name`
    pub fn slot(&self, name: &str) -> Option<&ParameterSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }
}

/// CPU copy of a parameter block
#[derive(Debug, Clone)]
pub struct ParameterBlock {
    layout: ParameterLayout,
    data: Vec<u8>,
}

impl ParameterBlock {
    /// Zero-initialized block for `layout`
    pub fn new(layout: ParameterLayout) -> Self {
        let data = vec![0; layout.size()];
        Self { layout, data }
    }

    /// Store `value` at `name`'s offset after checking name and type
    pub fn set(&mut self, name: &str, value: ParameterValue) -> FrameworkResult<()> {
        let slot = self
            .layout
            .slot(name)
            .ok_or_else(|| FrameworkError::UnknownParameter(name.to_string()))?;

        let actual = value.parameter_type();
        if slot.ty != actual {
            return Err(FrameworkError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: slot.ty,
                actual,
            });
        }

        let bytes = value.bytes();
        self.data[slot.offset..slot.offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Raw block contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Layout of the block
    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }
}

/// Builder for [`ParametersList`]
#[derive(Debug, Default, Clone)]
pub struct ParametersListBuilder {
    parameters: Vec<(String, ParameterType)>,
}

impl ParametersListBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter; order determines the layout
    pub fn add(mut self, name: impl Into<String>, ty: ParameterType) -> Self {
        self.parameters.push((name.into(), ty));
        self
    }

    /// Layout the declared parameters would get
    pub fn layout(&self) -> FrameworkResult<ParameterLayout> {
        if self.parameters.is_empty() {
            return Err(FrameworkError::InvalidInput(
                "parameters list needs at least one parameter".to_string(),
            ));
        }
        ParameterLayout::std140(&self.parameters)
    }

    /// Create the list with one uniform buffer per frame in flight
    pub fn build(self, target: &RenderTarget) -> FrameworkResult<ParametersList> {
        let layout = self.layout()?;
        let buffers = (0..target.frames_in_flight)
            .map(|_| {
                Buffer::new(
                    target.context.clone(),
                    layout.size() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    MemoryLocation::CpuToGpu,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Parameters list: {} parameters, {} bytes, {} frame copies",
            layout.slots().len(),
            layout.size(),
            buffers.len()
        );

        let handles = buffers.iter().map(Buffer::handle).collect();
        let frames = buffers.len();
        Ok(ParametersList {
            handles,
            size: layout.size() as vk::DeviceSize,
            state: Mutex::new(ParametersState {
                block: ParameterBlock::new(layout),
                dirty: vec![true; frames],
                buffers,
            }),
        })
    }
}

struct ParametersState {
    block: ParameterBlock,
    dirty: Vec<bool>,
    buffers: Vec<Buffer>,
}

/// Uniform block shared by materials
///
/// Setters take `&self` so a list can be shared through `Arc` between the
/// application and the materials that bind it.
pub struct ParametersList {
    handles: Vec<vk::Buffer>,
    size: vk::DeviceSize,
    state: Mutex<ParametersState>,
}

impl ParametersList {
    /// Set one parameter; every frame copy is refreshed on its next bind
    pub fn set(&self, name: &str, value: impl Into<ParameterValue>) -> FrameworkResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.block.set(name, value.into())?;
        state.dirty.iter_mut().for_each(|dirty| *dirty = true);
        Ok(())
    }

    /// Copy staged values into the buffer for `frame_index` if they changed since its last flush
    pub fn flush(&self, frame_index: usize) -> FrameworkResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let ParametersState { block, dirty, buffers } = &mut *state;

        let (Some(dirty), Some(buffer)) = (dirty.get_mut(frame_index), buffers.get_mut(frame_index)) else {
            return Err(FrameworkError::InvalidInput(format!("frame index {} out of range", frame_index)));
        };
        if *dirty {
            buffer.write_bytes(0, block.data())?;
            *dirty = false;
            log::trace!("Flushed {} parameter bytes for frame {}", block.data().len(), frame_index);
        }
        Ok(())
    }

    /// Uniform buffer backing `frame_index`
    pub fn buffer(&self, frame_index: usize) -> Option<vk::Buffer> {
        self.handles.get(frame_index).copied()
    }

    /// Block size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Number of frame copies
    pub fn frame_count(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(params: &[(&str, ParameterType)]) -> ParameterLayout {
        let owned: Vec<_> = params.iter().map(|(n, t)| (n.to_string(), *t)).collect();
        ParameterLayout::std140(&owned).unwrap()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn offsets(layout: &ParameterLayout) -> Vec<usize> {
        layout.slots().iter().map(|s| s.offset).collect()
    }

    #[test]
    fn test_vec3_aligns_to_16_and_float_packs_after_it() {
        let layout = layout(&[
            ("intensity", ParameterType::Float),
            ("direction", ParameterType::Vec3),
            ("ambient", ParameterType::Float),
        ]);
        assert_eq!(offsets(&layout), vec![0, 16, 28]);
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn test_mat4_and_vec2_alignment() {
        let layout = layout(&[
            ("scale", ParameterType::Float),
            ("uv_offset", ParameterType::Vec2),
            ("model", ParameterType::Mat4),
            ("tint", ParameterType::Vec4),
        ]);
        assert_eq!(offsets(&layout), vec![0, 8, 16, 80]);
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn test_size_rounds_up_to_vec4() {
        let layout = layout(&[("count", ParameterType::UInt)]);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let params = vec![
            ("a".to_string(), ParameterType::Float),
            ("a".to_string(), ParameterType::Vec4),
        ];
        assert!(matches!(
            ParameterLayout::std140(&params),
            Err(FrameworkError::DuplicateParameter(name)) if name == "a"
        ));
    }

    #[test]
    fn test_empty_builder_rejected() {
        assert!(matches!(
            ParametersListBuilder::new().layout(),
            Err(FrameworkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_block_writes_at_offset() {
        let mut block = ParameterBlock::new(layout(&[
            ("intensity", ParameterType::Float),
            ("color", ParameterType::Vec3),
        ]));
        block.set("color", [1.0f32, 2.0, 3.0].into()).unwrap();
        block.set("intensity", 0.5f32.into()).unwrap();

        assert_eq!(floats(block.data()), vec![0.5, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_block_rejects_wrong_type_and_name() {
        let mut block = ParameterBlock::new(layout(&[("intensity", ParameterType::Float)]));

        let mismatch = block.set("intensity", ParameterValue::Int(3));
        assert!(matches!(
            mismatch,
            Err(FrameworkError::ParameterTypeMismatch {
                expected: ParameterType::Float,
                actual: ParameterType::Int,
                ..
            })
        ));
        assert!(matches!(
            block.set("missing", 1.0f32.into()),
            Err(FrameworkError::UnknownParameter(_))
        ));
        assert!(block.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_matrix_values_are_column_major() {
        let mut block = ParameterBlock::new(layout(&[("model", ParameterType::Mat4)]));
        let translation = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        block.set("model", translation.into()).unwrap();

        assert_eq!(&floats(block.data())[12..16], &[4.0, 5.0, 6.0, 1.0]);
    }
}
