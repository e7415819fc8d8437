//! Materials: pipeline, descriptor bindings and push constants
//!
//! A material binds textures and parameter lists to fixed binding numbers of
//! descriptor set 0. It owns one descriptor set per frame in flight so that
//! each frame references the matching copy of every parameter list.

use ash::vk;
use std::sync::Arc;

use super::parameters::ParametersList;
use super::texture::Texture;
use super::{FrameworkError, FrameworkResult, ShaderStages};
use crate::app::{Frame, RenderTarget};
use crate::vk_utils::descriptor::pool_sizes_for;
use crate::vk_utils::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter, GraphicsPipeline,
    GraphicsPipelineBuilder, ShaderModule, ShaderSource, Vertex, VertexLayout,
};

/// Resource attached to a binding
#[derive(Clone)]
enum Resource {
    Texture(Arc<Texture>),
    Parameters(Arc<ParametersList>),
}

impl Resource {
    fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Resource::Texture(_) => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Resource::Parameters(_) => vk::DescriptorType::UNIFORM_BUFFER,
        }
    }
}

/// One entry of a [`BindingPlan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedBinding {
    /// Binding number in set 0
    pub binding: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
    /// Stages that read it
    pub stages: ShaderStages,
}

/// Validated descriptor layout for a material, sorted by binding number
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingPlan {
    bindings: Vec<PlannedBinding>,
}

impl BindingPlan {
    /// Check that binding numbers are unique and that every binding is visible to some stage
    pub fn new(mut bindings: Vec<PlannedBinding>) -> FrameworkResult<Self> {
        bindings.sort_by_key(|b| b.binding);
        if let Some(pair) = bindings.windows(2).find(|pair| pair[0].binding == pair[1].binding) {
            return Err(FrameworkError::DuplicateBinding(pair[0].binding));
        }
        if let Some(hidden) = bindings.iter().find(|b| b.stages.is_empty()) {
            return Err(FrameworkError::InvalidInput(format!(
                "binding {} is not visible to any shader stage",
                hidden.binding
            )));
        }
        Ok(Self { bindings })
    }

    /// Bindings in ascending order
    pub fn bindings(&self) -> &[PlannedBinding] {
        &self.bindings
    }

    /// Whether the material uses no descriptors at all
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Descriptor set layout description
    pub fn layout_builder(&self) -> DescriptorSetLayoutBuilder {
        self.bindings
            .iter()
            .fold(DescriptorSetLayoutBuilder::new(), |builder, b| match b.descriptor_type {
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER => {
                    builder.add_combined_image_sampler(b.binding, b.stages.to_vk())
                }
                _ => builder.add_uniform_buffer(b.binding, b.stages.to_vk()),
            })
    }

    /// Pool sizes for `set_count` sets
    pub fn pool_sizes(&self, set_count: u32) -> Vec<vk::DescriptorPoolSize> {
        pool_sizes_for(self.layout_builder().bindings(), set_count)
    }
}

/// Check push constant data against the declared range
///
/// Data must be non-empty, a multiple of 4 bytes and no larger than the range.
pub fn validate_push_constants(size: usize, range: Option<u32>) -> FrameworkResult<()> {
    let range_size = range.unwrap_or(0);
    if size == 0 || size % 4 != 0 || size > range_size as usize {
        return Err(FrameworkError::PushConstantSize {
            size,
            range: range_size,
        });
    }
    Ok(())
}

/// Builder for [`Material`]
///
/// Defaults: [`Vertex`] input layout, back-face culling, depth test and write on,
/// no blending, no push constants.
#[derive(Clone)]
pub struct MaterialBuilder {
    vertex_shader: Option<ShaderSource>,
    fragment_shader: Option<ShaderSource>,
    resources: Vec<(u32, ShaderStages, Resource)>,
    push_constants: Option<(u32, ShaderStages)>,
    vertex_layout: Option<VertexLayout>,
    cull_mode: vk::CullModeFlags,
    depth_test: bool,
    blending: bool,
}

impl Default for MaterialBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialBuilder {
    /// Builder with the defaults above and no shaders
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            resources: Vec::new(),
            push_constants: None,
            vertex_layout: Some(Vertex::layout()),
            cull_mode: vk::CullModeFlags::BACK,
            depth_test: true,
            blending: false,
        }
    }

    /// Vertex shader
    pub fn with_vertex_shader(mut self, source: ShaderSource) -> Self {
        self.vertex_shader = Some(source);
        self
    }

    /// Fragment shader
    pub fn with_fragment_shader(mut self, source: ShaderSource) -> Self {
        self.fragment_shader = Some(source);
        self
    }

    /// Bind a texture as a combined image sampler
    pub fn with_texture(mut self, binding: u32, texture: Arc<Texture>, stages: ShaderStages) -> Self {
        self.resources.push((binding, stages, Resource::Texture(texture)));
        self
    }

    /// Bind a parameters list as a uniform buffer
    pub fn with_parameters(mut self, binding: u32, parameters: Arc<ParametersList>, stages: ShaderStages) -> Self {
        self.resources.push((binding, stages, Resource::Parameters(parameters)));
        self
    }

    /// Declare a push constant range of `size` bytes starting at offset 0
    pub fn with_push_constants(mut self, size: u32, stages: ShaderStages) -> Self {
        self.push_constants = Some((size, stages));
        self
    }

    /// Replace the vertex input layout
    pub fn with_vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = Some(layout);
        self
    }

    /// Take no vertex input; shaders generate positions from `gl_VertexIndex`
    pub fn without_vertex_input(mut self) -> Self {
        self.vertex_layout = None;
        self
    }

    /// Face culling
    pub fn with_cull_mode(mut self, cull_mode: vk::CullModeFlags) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Depth test and write
    pub fn with_depth_test(mut self, enabled: bool) -> Self {
        self.depth_test = enabled;
        self
    }

    /// Alpha blending
    pub fn with_blending(mut self, enabled: bool) -> Self {
        self.blending = enabled;
        self
    }

    /// Descriptor plan of the resources added so far
    pub fn binding_plan(&self) -> FrameworkResult<BindingPlan> {
        BindingPlan::new(
            self.resources
                .iter()
                .map(|(binding, stages, resource)| PlannedBinding {
                    binding: *binding,
                    descriptor_type: resource.descriptor_type(),
                    stages: *stages,
                })
                .collect(),
        )
    }

    fn push_constant_range(&self) -> FrameworkResult<Option<vk::PushConstantRange>> {
        match self.push_constants {
            None => Ok(None),
            Some((size, stages)) => {
                if size == 0 || size % 4 != 0 || stages.is_empty() {
                    return Err(FrameworkError::PushConstantSize {
                        size: size as usize,
                        range: size,
                    });
                }
                Ok(Some(vk::PushConstantRange {
                    stage_flags: stages.to_vk(),
                    offset: 0,
                    size,
                }))
            }
        }
    }

    /// Compile shaders, create the pipeline and write one descriptor set per frame in flight
    pub fn build(self, target: &RenderTarget) -> FrameworkResult<Material> {
        let plan = self.binding_plan()?;
        let push_constants = self.push_constant_range()?;
        let vertex_source = self.vertex_shader.as_ref().ok_or(FrameworkError::MissingShader("vertex"))?;
        let fragment_source = self
            .fragment_shader
            .as_ref()
            .ok_or(FrameworkError::MissingShader("fragment"))?;

        let context = target.context.clone();
        let frames = target.frames_in_flight;

        for (_, _, resource) in &self.resources {
            if let Resource::Parameters(parameters) = resource {
                if parameters.frame_count() < frames {
                    return Err(FrameworkError::InvalidInput(format!(
                        "parameters list has {} frame copies, {} frames in flight",
                        parameters.frame_count(),
                        frames
                    )));
                }
            }
        }

        let vertex = ShaderModule::new(context.clone(), vertex_source, vk::ShaderStageFlags::VERTEX)?;
        let fragment = ShaderModule::new(context.clone(), fragment_source, vk::ShaderStageFlags::FRAGMENT)?;

        let (set_layout, pool, descriptor_sets) = if plan.is_empty() {
            (None, None, Vec::new())
        } else {
            let set_layout = plan.layout_builder().build(context.clone())?;
            let pool = DescriptorPool::new(context.clone(), frames as u32, &plan.pool_sizes(frames as u32))?;
            let sets = pool.allocate(set_layout.handle(), frames)?;

            let mut writer = DescriptorSetWriter::new();
            for (frame_index, &set) in sets.iter().enumerate() {
                for (binding, _, resource) in &self.resources {
                    writer = match resource {
                        Resource::Texture(texture) => {
                            writer.write_image(set, *binding, texture.view(), texture.sampler())
                        }
                        Resource::Parameters(parameters) => {
                            let buffer = parameters.buffer(frame_index).ok_or_else(|| {
                                FrameworkError::InvalidInput(format!("no parameter buffer for frame {}", frame_index))
                            })?;
                            writer.write_buffer(set, *binding, buffer, 0, parameters.size())
                        }
                    };
                }
            }
            writer.update(context.device());
            (Some(set_layout), Some(pool), sets)
        };

        let mut pipeline_builder = GraphicsPipelineBuilder::new()
            .with_shader(&vertex)
            .with_shader(&fragment)
            .with_cull_mode(self.cull_mode)
            .with_depth(self.depth_test, self.depth_test)
            .with_blending(self.blending);
        if let Some(layout) = self.vertex_layout.clone() {
            pipeline_builder = pipeline_builder.with_vertex_layout(layout);
        }
        if let Some(set_layout) = &set_layout {
            pipeline_builder = pipeline_builder.with_set_layouts(&[set_layout.handle()]);
        }
        if let Some(range) = push_constants {
            pipeline_builder = pipeline_builder.with_push_constant_range(range);
        }
        let pipeline = pipeline_builder.build(context, target.render_pass)?;

        log::debug!(
            "Material built: {} bindings, {} descriptor sets, push constants {:?}",
            plan.bindings().len(),
            descriptor_sets.len(),
            push_constants.map(|r| r.size)
        );

        let parameters = self
            .resources
            .iter()
            .filter_map(|(_, _, resource)| match resource {
                Resource::Parameters(parameters) => Some(parameters.clone()),
                Resource::Texture(_) => None,
            })
            .collect();
        let textures = self
            .resources
            .into_iter()
            .filter_map(|(_, _, resource)| match resource {
                Resource::Texture(texture) => Some(texture),
                Resource::Parameters(_) => None,
            })
            .collect();

        Ok(Material {
            pipeline,
            descriptor_sets,
            push_constants,
            _pool: pool,
            _set_layout: set_layout,
            parameters,
            _textures: textures,
        })
    }
}

/// Pipeline plus the resources it reads
pub struct Material {
    // Dropped in declaration order: pipeline, sets' pool, layout, then resources.
    pipeline: GraphicsPipeline,
    descriptor_sets: Vec<vk::DescriptorSet>,
    push_constants: Option<vk::PushConstantRange>,
    _pool: Option<DescriptorPool>,
    _set_layout: Option<DescriptorSetLayout>,
    parameters: Vec<Arc<ParametersList>>,
    _textures: Vec<Arc<Texture>>,
}

impl Material {
    /// Flush changed parameters for this frame, then bind the pipeline and descriptor set
    pub fn bind(&self, frame: &mut Frame) -> FrameworkResult<()> {
        let frame_index = frame.index();
        for parameters in &self.parameters {
            parameters.flush(frame_index)?;
        }

        let recorder = frame.recorder();
        recorder.bind_pipeline(self.pipeline.handle());
        if !self.descriptor_sets.is_empty() {
            let set = self.descriptor_sets.get(frame_index).copied().ok_or_else(|| {
                FrameworkError::InvalidInput(format!("no descriptor set for frame {}", frame_index))
            })?;
            recorder.bind_descriptor_sets(self.pipeline.layout(), &[set]);
        }
        Ok(())
    }

    /// Push `data` at offset 0 of the declared range
    pub fn push_constants<T: bytemuck::Pod>(&self, frame: &mut Frame, data: &T) -> FrameworkResult<()> {
        let bytes = bytemuck::bytes_of(data);
        validate_push_constants(bytes.len(), self.push_constants.map(|range| range.size))?;

        if let Some(range) = self.push_constants {
            frame
                .recorder()
                .push_constants(self.pipeline.layout(), range.stage_flags, 0, bytes);
        }
        Ok(())
    }

    /// Pipeline layout
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline.layout()
    }

    /// Declared push constant range
    pub fn push_constant_range(&self) -> Option<vk::PushConstantRange> {
        self.push_constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(binding: u32, descriptor_type: vk::DescriptorType, stages: ShaderStages) -> PlannedBinding {
        PlannedBinding {
            binding,
            descriptor_type,
            stages,
        }
    }

    #[test]
    fn test_plan_sorts_and_sizes_pool() {
        let plan = BindingPlan::new(vec![
            planned(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, ShaderStages::FRAGMENT),
            planned(0, vk::DescriptorType::UNIFORM_BUFFER, ShaderStages::ALL),
            planned(2, vk::DescriptorType::UNIFORM_BUFFER, ShaderStages::FRAGMENT),
        ])
        .unwrap();

        let order: Vec<u32> = plan.bindings().iter().map(|b| b.binding).collect();
        assert_eq!(order, vec![0, 1, 2]);

        let sizes = plan.pool_sizes(2);
        let count = |ty| sizes.iter().find(|s| s.ty == ty).map(|s| s.descriptor_count);
        assert_eq!(count(vk::DescriptorType::UNIFORM_BUFFER), Some(4));
        assert_eq!(count(vk::DescriptorType::COMBINED_IMAGE_SAMPLER), Some(2));
    }

    #[test]
    fn test_plan_layout_keeps_stages() {
        let plan = BindingPlan::new(vec![
            planned(0, vk::DescriptorType::UNIFORM_BUFFER, ShaderStages::ALL),
            planned(3, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, ShaderStages::FRAGMENT),
        ])
        .unwrap();
        let builder = plan.layout_builder();
        let bindings = builder.bindings();

        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(
            bindings[0].stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(bindings[1].binding, 3);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let result = BindingPlan::new(vec![
            planned(1, vk::DescriptorType::UNIFORM_BUFFER, ShaderStages::VERTEX),
            planned(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, ShaderStages::FRAGMENT),
        ]);
        assert!(matches!(result, Err(FrameworkError::DuplicateBinding(1))));
    }

    #[test]
    fn test_invisible_binding_rejected() {
        let result = BindingPlan::new(vec![planned(0, vk::DescriptorType::UNIFORM_BUFFER, ShaderStages::empty())]);
        assert!(matches!(result, Err(FrameworkError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_plan() {
        let plan = BindingPlan::new(Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.pool_sizes(3).is_empty());
    }

    #[test]
    fn test_push_constant_validation() {
        assert!(validate_push_constants(16, Some(16)).is_ok());
        assert!(validate_push_constants(8, Some(16)).is_ok());
        assert!(matches!(
            validate_push_constants(20, Some(16)),
            Err(FrameworkError::PushConstantSize { size: 20, range: 16 })
        ));
        assert!(validate_push_constants(6, Some(16)).is_err());
        assert!(validate_push_constants(0, Some(16)).is_err());
        assert!(validate_push_constants(4, None).is_err());
    }

    #[test]
    fn test_builder_push_constant_range() {
        let builder = MaterialBuilder::new().with_push_constants(32, ShaderStages::ALL);
        let range = builder.push_constant_range().unwrap().unwrap();
        assert_eq!(range.size, 32);
        assert_eq!(range.offset, 0);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);

        let misaligned = MaterialBuilder::new().with_push_constants(10, ShaderStages::VERTEX);
        assert!(misaligned.push_constant_range().is_err());
        assert!(MaterialBuilder::new().push_constant_range().unwrap().is_none());
    }

    #[test]
    fn test_builder_defaults() {
        let builder = MaterialBuilder::new();
        assert!(builder.vertex_layout.is_some());
        assert_eq!(builder.cull_mode, vk::CullModeFlags::BACK);
        assert!(builder.depth_test);
        assert!(!builder.blending);
        assert!(builder.binding_plan().unwrap().is_empty());
        assert!(builder.without_vertex_input().vertex_layout.is_none());
    }
}
