//! VMA-backed images, image views, layout transitions and samplers

use ash::{vk, Device};
use std::sync::Arc;
use vk_mem::Alloc;

use super::buffer::{Buffer, MemoryLocation};
use super::{Context, VulkanError, VulkanResult};

/// Depth attachment format used by the forward render pass
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Create a 2D view over `mip_levels` levels of `image`
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
    mip_levels: u32,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = unsafe { device.create_image_view(&create_info, None)? };
    Ok(view)
}

/// Access masks and pipeline stages for the layout transitions the framework performs
///
/// Returns `(src_access, dst_access, src_stage, dst_stage)`.
pub fn transition_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Option<(vk::AccessFlags, vk::AccessFlags, vk::PipelineStageFlags, vk::PipelineStageFlags)> {
    use vk::ImageLayout as L;
    match (old_layout, new_layout) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => Some((
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => Some((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
        )),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Some((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Some((
            vk::AccessFlags::TRANSFER_READ,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        _ => None,
    }
}

/// Record a color image layout transition over `level_count` mip levels
pub fn record_layout_transition(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    base_mip_level: u32,
    level_count: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> VulkanResult<()> {
    let (src_access, dst_access, src_stage, dst_stage) = transition_masks(old_layout, new_layout)
        .ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("Unsupported layout transition {:?} -> {:?}", old_layout, new_layout),
        })?;

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build();

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
    Ok(())
}

/// Image plus its default view, allocated through VMA
pub struct Image {
    context: Arc<Context>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
}

impl Image {
    /// Create a device-local 2D image with a view covering every mip level
    pub fn new_2d(
        context: Arc<Context>,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect_mask: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Images cannot have a zero extent".to_string(),
            });
        }

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(mip_levels.max(1))
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let (image, mut allocation) = unsafe {
            context
                .allocator()
                .create_image(&image_info, &MemoryLocation::GpuOnly.allocation_info())
                .map_err(VulkanError::Allocation)?
        };

        let view = match create_image_view(context.device(), image, format, aspect_mask, mip_levels.max(1)) {
            Ok(view) => view,
            Err(e) => {
                unsafe { context.allocator().destroy_image(image, &mut allocation) };
                return Err(e);
            }
        };

        Ok(Self {
            context,
            image,
            allocation,
            view,
            format,
            extent,
            mip_levels: mip_levels.max(1),
        })
    }

    /// Depth attachment matching the swapchain extent
    pub fn depth(context: Arc<Context>, extent: vk::Extent2D) -> VulkanResult<Self> {
        Self::new_2d(
            context,
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
            1,
        )
    }

    /// Upload RGBA8 pixels into a sampled image, generating mipmaps down to 1x1 when `mip_levels > 1`
    ///
    /// Falls back to a single level if the format cannot be linearly blitted.
    pub fn from_rgba8(
        context: Arc<Context>,
        width: u32,
        height: u32,
        pixels: &[u8],
        format: vk::Format,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Expected {} bytes of RGBA8 data, got {}", expected, pixels.len()),
            });
        }

        let mip_levels = if mip_levels > 1 && !Self::supports_linear_blit(&context, format) {
            log::warn!("{:?} does not support linear blits; skipping mipmaps", format);
            1
        } else {
            mip_levels.max(1)
        };

        let staging = Buffer::with_data(context.clone(), vk::BufferUsageFlags::TRANSFER_SRC, pixels)?;

        let mut usage = vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED;
        if mip_levels > 1 {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        let extent = vk::Extent2D { width, height };
        let image = Self::new_2d(context.clone(), extent, format, usage, vk::ImageAspectFlags::COLOR, mip_levels)?;

        let mut recorded = Ok(());
        context.submit_one_shot(|device, cmd| {
            recorded = image.record_upload(device, cmd, staging.handle());
        })?;
        recorded?;

        log::debug!("Uploaded {}x{} texture with {} mip levels", width, height, mip_levels);
        Ok(image)
    }

    fn supports_linear_blit(context: &Context, format: vk::Format) -> bool {
        let properties = unsafe {
            context
                .instance()
                .get_physical_device_format_properties(context.physical_device().device, format)
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }

    fn record_upload(&self, device: &Device, cmd: vk::CommandBuffer, staging: vk::Buffer) -> VulkanResult<()> {
        record_layout_transition(
            device,
            cmd,
            self.image,
            0,
            self.mip_levels,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .build();

        unsafe {
            device.cmd_copy_buffer_to_image(
                cmd,
                staging,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        self.record_mipmaps(device, cmd)
    }

    /// Blit each level from the previous one and leave every level shader-readable
    fn record_mipmaps(&self, device: &Device, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        let mut mip_width = self.extent.width as i32;
        let mut mip_height = self.extent.height as i32;

        for level in 1..self.mip_levels {
            record_layout_transition(
                device,
                cmd,
                self.image,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            )?;

            let next_width = (mip_width / 2).max(1);
            let next_height = (mip_height / 2).max(1);

            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: mip_width, y: mip_height, z: 1 },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: next_width, y: next_height, z: 1 },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .build();

            unsafe {
                device.cmd_blit_image(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );
            }

            record_layout_transition(
                device,
                cmd,
                self.image,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?;

            mip_width = next_width;
            mip_height = next_height;
        }

        record_layout_transition(
            device,
            cmd,
            self.image,
            self.mip_levels - 1,
            1,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over all mip levels
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size of mip level 0
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_image_view(self.view, None);
            self.context
                .allocator()
                .destroy_image(self.image, &mut self.allocation);
        }
    }
}

/// Sampler wrapper with RAII cleanup
pub struct Sampler {
    context: Arc<Context>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create a sampler; anisotropy is used when the device supports it
    pub fn new(
        context: Arc<Context>,
        filter: vk::Filter,
        address_mode: vk::SamplerAddressMode,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        let anisotropy = context.physical_device().max_anisotropy();
        let mipmap_mode = if filter == vk::Filter::NEAREST {
            vk::SamplerMipmapMode::NEAREST
        } else {
            vk::SamplerMipmapMode::LINEAR
        };

        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(filter)
            .min_filter(filter)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(mipmap_mode)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        let sampler = unsafe { context.device().create_sampler(&create_info, None)? };
        Ok(Self { context, sampler })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transition() {
        let (src, dst, src_stage, dst_stage) = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert!(src.is_empty());
        assert_eq!(dst, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_shader_read_transitions_target_fragment_stage() {
        for old in [vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL] {
            let (_, dst, _, dst_stage) =
                transition_masks(old, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL).unwrap();
            assert_eq!(dst, vk::AccessFlags::SHADER_READ);
            assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        }
    }

    #[test]
    fn test_unknown_transition() {
        assert!(transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR
        )
        .is_none());
    }
}
