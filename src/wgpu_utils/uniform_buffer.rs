// src/wgpu_utils/uniform_buffer.rs
use std::{marker::PhantomData, num::NonZeroU64};

fn short_type_name<Content>() -> &'static str {
    let type_name = std::any::type_name::<Content>();
    let pos = type_name.rfind(':').unwrap_or(0);
    if pos > 0 {
        &type_name[(pos + 1)..]
    } else {
        type_name
    }
}

/// Uniform buffer holding a single `Content` value
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    /// Create a new uniform buffer
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", short_type_name::<Content>())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        UniformBuffer {
            buffer,
            content_type: PhantomData,
            previous_content: Vec::new(),
        }
    }

    /// Create buffer with initial data
    pub fn new_with_data(device: &wgpu::Device, initial_content: &Content) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", short_type_name::<Content>())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: true,
        });

        buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::bytes_of(initial_content));
        buffer.unmap();

        UniformBuffer {
            buffer,
            content_type: PhantomData,
            previous_content: bytemuck::bytes_of(initial_content).to_vec(),
        }
    }

    /// Update buffer content (skips the write when nothing changed)
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) {
        let new_content = bytemuck::bytes_of(&content);
        if self.previous_content == new_content {
            return;
        }
        queue.write_buffer(&self.buffer, 0, new_content);
        self.previous_content = new_content.to_vec();
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// Uniform buffer with one aligned slot per draw, bound with dynamic offsets
///
/// All per-draw values of a frame are packed at `stride` and uploaded with a
/// single write before the passes are encoded, so no draw ever sees another
/// draw's uniforms.
pub struct DynamicUniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    stride: u64,
    capacity: usize,
}

impl<Content: bytemuck::Pod> DynamicUniformBuffer<Content> {
    /// Create a buffer with room for `capacity` slots
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating the buffer
    /// * `capacity` - Initial number of slots
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let stride = Self::stride_for(alignment);
        let capacity = capacity.max(1);

        DynamicUniformBuffer {
            buffer: Self::allocate(device, stride, capacity),
            content_type: PhantomData,
            stride,
            capacity,
        }
    }

    /// Slot size for the given offset alignment
    pub fn stride_for(alignment: u32) -> u64 {
        wgpu::util::align_to(
            std::mem::size_of::<Content>() as u64,
            u64::from(alignment.max(1)),
        )
    }

    fn allocate(device: &wgpu::Device, stride: u64, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!(
                "DynamicUniformBuffer<{}>",
                short_type_name::<Content>()
            )),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Grows the buffer to hold at least `count` slots.
    ///
    /// # Returns
    /// `true` when the buffer was reallocated; bind groups referencing it must be rebuilt.
    pub fn reserve(&mut self, device: &wgpu::Device, count: usize) -> bool {
        if count <= self.capacity {
            return false;
        }
        let capacity = count.next_power_of_two();
        log::debug!(
            "Growing {} from {} to {} slots",
            short_type_name::<Content>(),
            self.capacity,
            capacity
        );
        self.buffer = Self::allocate(device, self.stride, capacity);
        self.capacity = capacity;
        true
    }

    /// Uploads `items` into consecutive slots starting at slot 0
    pub fn write(&self, queue: &wgpu::Queue, items: &[Content]) {
        if items.is_empty() {
            return;
        }
        debug_assert!(items.len() <= self.capacity, "reserve() before write()");
        queue.write_buffer(&self.buffer, 0, &pack_strided(items, self.stride));
    }

    /// Dynamic offset of slot `index`
    pub fn offset(&self, index: u32) -> u32 {
        (u64::from(index) * self.stride) as u32
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Binding covering a single slot; the dynamic offset selects which one.
    pub fn binding_resource(&self) -> wgpu::BindingResource {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(std::mem::size_of::<Content>() as u64),
        })
    }
}

/// Packs `items` into a byte vector with one `stride`-sized slot per item.
pub fn pack_strided<Content: bytemuck::Pod>(items: &[Content], stride: u64) -> Vec<u8> {
    let stride = stride as usize;
    let size = std::mem::size_of::<Content>();
    debug_assert!(stride >= size);

    let mut bytes = vec![0u8; stride * items.len()];
    for (slot, item) in bytes.chunks_exact_mut(stride).zip(items) {
        slot[..size].copy_from_slice(bytemuck::bytes_of(item));
    }
    bytes
}
