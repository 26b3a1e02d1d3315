//! Per-frame uniform bindings
//!
//! Group 0 of every scene pipeline holds the [`FrameUniform`]; group 1 holds
//! the per-draw [`InstanceUniform`] slots, selected with a dynamic offset.

use crate::{
    gfx::rendering::frame_plan::{FrameUniform, InstanceUniform},
    wgpu_utils::{
        binding_types, BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc,
        DynamicUniformBuffer, UniformBuffer,
    },
};

/// Frame and instance uniforms with their layouts and bind groups
pub struct FrameBindings {
    frame_layout: BindGroupLayoutWithDesc,
    instance_layout: BindGroupLayoutWithDesc,
    frame_ubo: UniformBuffer<FrameUniform>,
    instances: DynamicUniformBuffer<InstanceUniform>,
    frame_bind_group: wgpu::BindGroup,
    instance_bind_group: wgpu::BindGroup,
}

impl FrameBindings {
    /// Creates the layouts, buffers and bind groups
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating resources
    /// * `capacity` - Initial number of instance slots; grows on demand
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let frame_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(device, "Frame Bind Group Layout");

        let instance_layout = BindGroupLayoutBuilder::new()
            .next_binding_vertex(binding_types::uniform_dynamic(
                std::mem::size_of::<InstanceUniform>() as u64,
            ))
            .create(device, "Instance Bind Group Layout");

        let frame_ubo = UniformBuffer::new(device);
        let instances = DynamicUniformBuffer::new(device, capacity);

        let frame_bind_group = BindGroupBuilder::new(&frame_layout)
            .resource(frame_ubo.binding_resource())
            .create(device, "Frame Bind Group");
        let instance_bind_group = Self::instance_group(device, &instance_layout, &instances);

        Self {
            frame_layout,
            instance_layout,
            frame_ubo,
            instances,
            frame_bind_group,
            instance_bind_group,
        }
    }

    fn instance_group(
        device: &wgpu::Device,
        layout: &BindGroupLayoutWithDesc,
        instances: &DynamicUniformBuffer<InstanceUniform>,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(layout)
            .resource(instances.binding_resource())
            .create(device, "Instance Bind Group")
    }

    pub fn frame_layout(&self) -> &wgpu::BindGroupLayout {
        &self.frame_layout.layout
    }

    pub fn instance_layout(&self) -> &wgpu::BindGroupLayout {
        &self.instance_layout.layout
    }

    /// Uploads this frame's uniforms, growing the instance buffer if needed
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: FrameUniform,
        instances: &[InstanceUniform],
    ) {
        if self.instances.reserve(device, instances.len()) {
            self.instance_bind_group = Self::instance_group(device, &self.instance_layout, &self.instances);
        }
        self.instances.write(queue, instances);
        self.frame_ubo.update_content(queue, frame);
    }

    pub fn frame_bind_group(&self) -> &wgpu::BindGroup {
        &self.frame_bind_group
    }

    pub fn instance_bind_group(&self) -> &wgpu::BindGroup {
        &self.instance_bind_group
    }

    /// Dynamic offset of instance slot `instance`
    pub fn instance_offset(&self, instance: u32) -> u32 {
        self.instances.offset(instance)
    }

    pub fn instance_capacity(&self) -> usize {
        self.instances.capacity()
    }
}
