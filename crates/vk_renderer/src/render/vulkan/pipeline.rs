//! Graphics pipeline construction
//!
//! One fixed pipeline renders the textured model: triangle-list input,
//! static viewport sized to the swapchain, back-face culling, depth test
//! with LESS, no blending. The descriptor set layout (uniform buffer at
//! binding 0, combined image sampler at binding 1) lives here because the
//! pipeline layout is derived from it.

use ash::{vk, Device};
use std::ffi::CStr;

use crate::render::Vertex;

use super::{VulkanError, VulkanResult};

/// Shader module with RAII cleanup, alive only while the pipeline is built
struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    fn new(device: Device, code: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "shader module",
                    result,
                })?
        };

        Ok(Self { device, module })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline with its layout and descriptor set layout
pub struct GraphicsPipeline {
    device: Device,
    descriptor_set_layout: vk::DescriptorSetLayout,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        vert_code: &[u32],
        frag_code: &[u32],
    ) -> VulkanResult<Self> {
        let descriptor_set_layout = Self::create_descriptor_set_layout(&device)?;

        let layout = {
            let set_layouts = [descriptor_set_layout];
            let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
            match unsafe { device.create_pipeline_layout(&layout_info, None) } {
                Ok(layout) => layout,
                Err(result) => {
                    unsafe { device.destroy_descriptor_set_layout(descriptor_set_layout, None) };
                    return Err(VulkanError::ResourceCreation {
                        what: "pipeline layout",
                        result,
                    });
                }
            }
        };

        let pipeline =
            match Self::create_pipeline(&device, render_pass, extent, layout, vert_code, frag_code)
            {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    unsafe {
                        device.destroy_pipeline_layout(layout, None);
                        device.destroy_descriptor_set_layout(descriptor_set_layout, None);
                    }
                    return Err(e);
                }
            };

        Ok(Self {
            device,
            descriptor_set_layout,
            layout,
            pipeline,
        })
    }

    fn create_descriptor_set_layout(device: &Device) -> VulkanResult<vk::DescriptorSetLayout> {
        let bindings = [
            // Binding 0: per-frame transform matrices, read by the vertex stage
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::VERTEX,
                ..Default::default()
            },
            // Binding 1: model texture, sampled by the fragment stage
            vk::DescriptorSetLayoutBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                ..Default::default()
            },
        ];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "descriptor set layout",
                    result,
                })
        }
    }

    fn create_pipeline(
        device: &Device,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        layout: vk::PipelineLayout,
        vert_code: &[u32],
        frag_code: &[u32],
    ) -> VulkanResult<vk::Pipeline> {
        let vert_module = ShaderModule::new(device.clone(), vert_code)?;
        let frag_module = ShaderModule::new(device.clone(), frag_code)?;

        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };
        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module.module)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module.module)
                .name(entry_point)
                .build(),
        ];

        let binding_descriptions = [Vertex::binding_description()];
        let attribute_descriptions = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            ..Default::default()
        }];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, result)| VulkanError::ResourceCreation {
                    what: "graphics pipeline",
                    result,
                })?
        };

        Ok(pipelines[0])
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}
