//! Descriptor set layouts, pools and writes.
//!
//! Everything here is built with builders:
//! - [`DescriptorSetLayoutBuilder`] collects bindings (one entry per binding index)
//! - [`DescriptorPoolBuilder`] collects pool sizes, flags and the set budget
//! - [`DescriptorWriter`] collects buffer/image writes and applies them to a
//!   newly allocated set or an existing one
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use engine_rhi::device::Device;
//! use engine_rhi::descriptor::{DescriptorPoolBuilder, DescriptorSetLayoutBuilder, DescriptorWriter};
//!
//! # fn example(device: Arc<Device>, info: vk::DescriptorBufferInfo) -> engine_rhi::RhiResult<()> {
//! let layout = DescriptorSetLayoutBuilder::new()
//!     .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX, 1)
//!     .build(device.clone())?;
//!
//! let pool = DescriptorPoolBuilder::new()
//!     .max_sets(2)
//!     .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 2)
//!     .build(device)?;
//!
//! let set = DescriptorWriter::new(&layout, &pool)
//!     .write_buffer(0, info)?
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// One binding slot of a layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutBinding {
    pub descriptor_type: vk::DescriptorType,
    pub stage_flags: vk::ShaderStageFlags,
    pub count: u32,
}

/// Collects bindings for a [`DescriptorSetLayout`].
#[derive(Debug, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: HashMap<u32, LayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding slot.
    ///
    /// # Panics
    ///
    /// Panics if `binding` was already added.
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        assert!(
            !self.bindings.contains_key(&binding),
            "descriptor binding {binding} already in use"
        );
        self.bindings.insert(
            binding,
            LayoutBinding {
                descriptor_type,
                stage_flags,
                count,
            },
        );
        self
    }

    /// Creates the layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn build(self, device: Arc<Device>) -> RhiResult<DescriptorSetLayout> {
        DescriptorSetLayout::new(device, self.bindings)
    }
}

/// Descriptor set layout wrapper that remembers its bindings.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
    bindings: HashMap<u32, LayoutBinding>,
}

impl DescriptorSetLayout {
    fn new(device: Arc<Device>, bindings: HashMap<u32, LayoutBinding>) -> RhiResult<Self> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|(&index, binding)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(index)
                    .descriptor_type(binding.descriptor_type)
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stage_flags)
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            vk_bindings.len()
        );

        Ok(Self {
            device,
            layout,
            bindings,
        })
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Returns the slot declared at `binding`, if any.
    #[inline]
    pub fn binding(&self, binding: u32) -> Option<&LayoutBinding> {
        self.bindings.get(&binding)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Collects the configuration of a [`DescriptorPool`].
#[derive(Debug)]
pub struct DescriptorPoolBuilder {
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl Default for DescriptorPoolBuilder {
    fn default() -> Self {
        Self {
            pool_sizes: Vec::new(),
            max_sets: 1000,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }
}

impl DescriptorPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `count` descriptors of `descriptor_type`.
    pub fn add_pool_size(mut self, descriptor_type: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(
            vk::DescriptorPoolSize::default()
                .ty(descriptor_type)
                .descriptor_count(count),
        );
        self
    }

    pub fn pool_flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Creates the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn build(self, device: Arc<Device>) -> RhiResult<DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
            .flags(self.flags);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            self.max_sets,
            self.pool_sizes.len()
        );

        Ok(DescriptorPool {
            device,
            pool,
            max_sets: self.max_sets,
        })
    }
}

/// Descriptor pool for allocating descriptor sets.
pub struct DescriptorPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor pool handle.
    pool: vk::DescriptorPool,
    /// Maximum number of sets that can be allocated.
    max_sets: u32,
}

impl DescriptorPool {
    /// Allocates one descriptor set per layout.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails (e.g., pool exhausted).
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    /// Allocates a single descriptor set.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn allocate_one(&self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        self.allocate(&[layout])?
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::DescriptorError("No descriptor set allocated".to_string()))
    }

    /// Frees descriptor sets back to the pool.
    ///
    /// Requires the pool to be built with `FREE_DESCRIPTOR_SET`, and the sets
    /// must not be in use by the GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if freeing fails.
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> RhiResult<()> {
        unsafe {
            self.device.handle().free_descriptor_sets(self.pool, sets)?;
        }

        debug!("Freed {} descriptor set(s)", sets.len());

        Ok(())
    }

    /// Returns every allocated set to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        }

        debug!("Reset descriptor pool");

        Ok(())
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the maximum number of sets that can be allocated from this pool.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

#[derive(Clone, Copy, Debug)]
enum WriteInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

#[derive(Clone, Copy, Debug)]
struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: WriteInfo,
}

/// Collects writes against a layout and applies them to a descriptor set.
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a DescriptorPool,
    writes: Vec<PendingWrite>,
}

impl<'a> DescriptorWriter<'a> {
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a DescriptorPool) -> Self {
        Self {
            layout,
            pool,
            writes: Vec::new(),
        }
    }

    /// Queues a buffer write.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DescriptorError`] if the layout has no such binding
    /// or the binding holds more than one descriptor.
    pub fn write_buffer(
        &mut self,
        binding: u32,
        info: vk::DescriptorBufferInfo,
    ) -> RhiResult<&mut Self> {
        let descriptor_type = single_descriptor_type(&self.layout.bindings, binding)?;
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            info: WriteInfo::Buffer(info),
        });
        Ok(self)
    }

    /// Queues an image write.
    ///
    /// # Errors
    ///
    /// Same conditions as [`write_buffer`](Self::write_buffer).
    pub fn write_image(
        &mut self,
        binding: u32,
        info: vk::DescriptorImageInfo,
    ) -> RhiResult<&mut Self> {
        let descriptor_type = single_descriptor_type(&self.layout.bindings, binding)?;
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            info: WriteInfo::Image(info),
        });
        Ok(self)
    }

    /// Allocates a set from the pool and applies the queued writes.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn build(&self) -> RhiResult<vk::DescriptorSet> {
        let set = self.pool.allocate_one(self.layout.handle())?;
        self.overwrite(set);
        Ok(set)
    }

    /// Applies the queued writes to an existing set.
    pub fn overwrite(&self, set: vk::DescriptorSet) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|pending| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(pending.binding)
                    .dst_array_element(0)
                    .descriptor_type(pending.descriptor_type);
                match &pending.info {
                    WriteInfo::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    WriteInfo::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();

        if writes.is_empty() {
            return;
        }

        unsafe {
            self.layout
                .device
                .handle()
                .update_descriptor_sets(&writes, &[]);
        }

        debug!("Wrote {} descriptor(s)", writes.len());
    }
}

/// Type of `binding`, which must exist and hold exactly one descriptor.
fn single_descriptor_type(
    bindings: &HashMap<u32, LayoutBinding>,
    binding: u32,
) -> RhiResult<vk::DescriptorType> {
    let slot = bindings.get(&binding).ok_or_else(|| {
        RhiError::DescriptorError(format!("Layout does not contain binding {binding}"))
    })?;

    if slot.count != 1 {
        return Err(RhiError::DescriptorError(format!(
            "Binding {binding} expects {} descriptors, single write given",
            slot.count
        )));
    }

    Ok(slot.descriptor_type)
}
