//! GPU memory buffers.
//!
//! # Overview
//!
//! [`Buffer`] owns a `VkBuffer` backed by a gpu-allocator [`Allocation`] of
//! `align(instance_size, min_offset_alignment) * instance_count` bytes. The
//! stride between instances (`alignment_size`) lets one allocation hold an
//! array of uniform blocks addressed by index.
//!
//! Host-visible allocations stay persistently mapped by the allocator. Host
//! access still goes through an explicit window: [`Buffer::map`] (or
//! [`Buffer::map_all`]) opens a [`MappedRange`] and every write, flush and
//! invalidate must fall inside it. Writing while unmapped trips a debug
//! assertion and returns [`RhiError::MappingError`] in release builds.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use engine_rhi::buffer::Buffer;
//! use engine_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> engine_rhi::RhiResult<()> {
//! let alignment = device.properties().limits.min_uniform_buffer_offset_alignment;
//! let mut ubo = Buffer::new(
//!     device,
//!     64,
//!     2,
//!     vk::BufferUsageFlags::UNIFORM_BUFFER,
//!     vk::MemoryPropertyFlags::HOST_VISIBLE,
//!     alignment,
//! )?;
//! ubo.map_all()?;
//! ubo.write_to_index(&[0u8; 64], 1)?;
//! ubo.flush_index(1)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error, trace};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Rounds `instance_size` up to a multiple of `min_offset_alignment`.
///
/// `min_offset_alignment` must be zero or a power of two; zero means no
/// alignment requirement.
#[inline]
pub fn align(instance_size: vk::DeviceSize, min_offset_alignment: vk::DeviceSize) -> vk::DeviceSize {
    if min_offset_alignment > 0 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// Offset and range of instance `index` in a buffer with stride `alignment_size`.
#[inline]
pub fn index_range(index: u32, alignment_size: vk::DeviceSize) -> (vk::DeviceSize, vk::DeviceSize) {
    (vk::DeviceSize::from(index) * alignment_size, alignment_size)
}

/// Widens `[offset, offset + size)` outward to multiples of `atom`, then
/// clamps the end to `limit`.
///
/// Flushes and invalidates of non-coherent memory must cover whole
/// `nonCoherentAtomSize` blocks. An `atom` of 0 or 1 leaves the range as is.
pub fn atom_aligned_range(
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    atom: vk::DeviceSize,
    limit: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    if atom <= 1 {
        return (offset, size);
    }
    let start = offset / atom * atom;
    let end = (offset + size).div_ceil(atom) * atom;
    let end = end.min(limit).max(start);
    (start, end - start)
}

/// Where gpu-allocator should place memory with the requested properties.
///
/// Host-visible requests land in upload memory, or readback memory when they
/// also ask for host caching. Everything else is device-only.
pub fn memory_location(properties: vk::MemoryPropertyFlags) -> MemoryLocation {
    if properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        if properties.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
            MemoryLocation::GpuToCpu
        } else {
            MemoryLocation::CpuToGpu
        }
    } else {
        MemoryLocation::GpuOnly
    }
}

/// Byte window of a buffer open for host access, in buffer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedRange {
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl MappedRange {
    /// Resolves a `map(size, offset)` request against a buffer of
    /// `buffer_size` bytes. `vk::WHOLE_SIZE` extends to the end of the buffer.
    ///
    /// Returns `None` for an empty window or one that runs past the buffer.
    pub fn resolve(
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
        buffer_size: vk::DeviceSize,
    ) -> Option<Self> {
        let size = if size == vk::WHOLE_SIZE {
            buffer_size.checked_sub(offset)?
        } else {
            size
        };
        let end = offset.checked_add(size)?;
        (size > 0 && end <= buffer_size).then_some(Self { offset, size })
    }

    /// Whether `[offset, offset + len)` lies inside the window.
    #[inline]
    pub fn contains(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> bool {
        offset >= self.offset
            && offset
                .checked_add(len)
                .is_some_and(|end| end <= self.offset + self.size)
    }

    /// Expands `(size, offset)` with `vk::WHOLE_SIZE` meaning the whole
    /// window, and returns it as `(offset, len)` when it fits inside.
    fn clip(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Option<(vk::DeviceSize, vk::DeviceSize)> {
        let (offset, len) = if size == vk::WHOLE_SIZE {
            (self.offset, self.size)
        } else {
            (offset, size)
        };
        self.contains(offset, len).then_some((offset, len))
    }
}

/// Device buffer with gpu-allocator managed memory.
///
/// Not `Clone`: the buffer exclusively owns its handle and allocation.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// Backing memory, `None` only while construction is incomplete.
    allocation: Option<Allocation>,
    /// Window open for host access.
    mapped: Option<MappedRange>,
    /// Total size in bytes.
    buffer_size: vk::DeviceSize,
    instance_count: u32,
    instance_size: vk::DeviceSize,
    /// Stride between instances.
    alignment_size: vk::DeviceSize,
    usage_flags: vk::BufferUsageFlags,
    memory_property_flags: vk::MemoryPropertyFlags,
}

impl Buffer {
    /// Creates a buffer holding `instance_count` aligned instances.
    ///
    /// # Arguments
    ///
    /// * `device` - The device context
    /// * `instance_size` - Size of one element in bytes
    /// * `instance_count` - Number of elements
    /// * `usage_flags` - Vulkan buffer usage
    /// * `memory_property_flags` - Required memory properties
    /// * `min_offset_alignment` - Stride alignment, 1 or 0 for tightly packed data
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero, no memory type carries
    /// `memory_property_flags`, or allocation or any Vulkan call fails.
    pub fn new(
        device: Arc<Device>,
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage_flags: vk::BufferUsageFlags,
        memory_property_flags: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> RhiResult<Self> {
        let alignment_size = align(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * vk::DeviceSize::from(instance_count);

        if buffer_size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(usage_flags)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        // Drop releases whatever exists if a step below fails
        let mut created = Self {
            device,
            buffer,
            allocation: None,
            mapped: None,
            buffer_size,
            instance_count,
            instance_size,
            alignment_size,
            usage_flags,
            memory_property_flags,
        };

        let requirements = unsafe { created.device.handle().get_buffer_memory_requirements(buffer) };
        created
            .device
            .find_memory_type(requirements.memory_type_bits, memory_property_flags)?;

        let allocation = created.device.allocator()?.allocate(&AllocationCreateDesc {
            name: "buffer",
            requirements,
            location: memory_location(memory_property_flags),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        let (memory, memory_offset) = (unsafe { allocation.memory() }, allocation.offset());
        created.allocation = Some(allocation);

        unsafe {
            created
                .device
                .handle()
                .bind_buffer_memory(buffer, memory, memory_offset)?;
        }

        debug!(
            "Created buffer: {} x {} bytes (stride {}), {:?}",
            instance_count, instance_size, alignment_size, usage_flags
        );

        Ok(created)
    }

    /// Uploads `data` into a new device-local buffer through a staging copy.
    ///
    /// `TRANSFER_DST` is added to `usage_flags` automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer cannot be created or the copy fails.
    pub fn upload_device_local(
        device: Arc<Device>,
        data: &[u8],
        usage_flags: vk::BufferUsageFlags,
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;

        let mut staging = Self::new(
            device.clone(),
            size,
            1,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            1,
        )?;
        staging.map_all()?;
        staging.write(data, vk::WHOLE_SIZE, 0)?;
        staging.unmap();

        let buffer = Self::new(
            device.clone(),
            size,
            1,
            usage_flags | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            1,
        )?;
        device.copy_buffer(staging.handle(), buffer.handle(), size)?;

        Ok(buffer)
    }

    /// Opens `size` bytes starting at `offset` for host access.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::MappingError`] if the buffer is already mapped, its
    /// memory is not host visible, or the window falls outside the buffer.
    pub fn map(&mut self, size: vk::DeviceSize, offset: vk::DeviceSize) -> RhiResult<()> {
        if self.mapped.is_some() {
            return Err(RhiError::MappingError("Buffer is already mapped".to_string()));
        }

        if self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .is_none()
        {
            return Err(RhiError::MappingError(
                "Buffer memory is not host visible".to_string(),
            ));
        }

        let window = MappedRange::resolve(size, offset, self.buffer_size).ok_or_else(|| {
            RhiError::MappingError(format!(
                "Cannot map {} bytes at {} of a {}-byte buffer",
                size, offset, self.buffer_size
            ))
        })?;

        trace!("Mapped buffer window {:?}", window);
        self.mapped = Some(window);
        Ok(())
    }

    /// Opens the whole buffer for host access.
    ///
    /// # Errors
    ///
    /// See [`map`](Self::map).
    pub fn map_all(&mut self) -> RhiResult<()> {
        self.map(vk::WHOLE_SIZE, 0)
    }

    /// Closes the host window. Does nothing if it is not mapped.
    pub fn unmap(&mut self) {
        self.mapped = None;
    }

    /// Returns whether the buffer is currently mapped.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// The open host window, in buffer coordinates.
    #[inline]
    pub fn mapped_range(&self) -> Option<MappedRange> {
        self.mapped
    }

    /// Host view of the bytes inside the open window.
    pub fn mapped_slice(&self) -> Option<&[u8]> {
        let window = self.mapped?;
        let bytes = self.allocation.as_ref()?.mapped_slice()?;
        bytes.get(window.offset as usize..(window.offset + window.size) as usize)
    }

    /// Copies `data` into the mapped window.
    ///
    /// `offset` is measured from the start of the buffer. With
    /// `size == vk::WHOLE_SIZE` the whole window is written and `data` must
    /// cover it; otherwise `size` bytes land at `offset`, which must lie
    /// inside the window.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::MappingError`] if the buffer is not mapped and
    /// [`RhiError::InvalidHandle`] if the write is out of range.
    pub fn write(
        &mut self,
        data: &[u8],
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> RhiResult<()> {
        debug_assert!(self.mapped.is_some(), "cannot write to an unmapped buffer");
        let window = self
            .mapped
            .ok_or_else(|| RhiError::MappingError("Cannot write to unmapped buffer".to_string()))?;

        let (offset, len) = window.clip(size, offset).ok_or_else(|| {
            RhiError::InvalidHandle(format!(
                "Write of {} bytes at {} falls outside mapped window {:?}",
                size, offset, window
            ))
        })?;

        if len > data.len() as vk::DeviceSize {
            return Err(RhiError::InvalidHandle(format!(
                "Write of {} bytes given only {} bytes of data",
                len,
                data.len()
            )));
        }

        let dst = self
            .allocation
            .as_mut()
            .and_then(Allocation::mapped_slice_mut)
            .and_then(|bytes| bytes.get_mut(offset as usize..(offset + len) as usize))
            .ok_or_else(|| {
                RhiError::MappingError("Buffer memory is not host visible".to_string())
            })?;
        dst.copy_from_slice(&data[..len as usize]);

        Ok(())
    }

    /// Makes host writes in the range visible to the device.
    ///
    /// A no-op on host-coherent memory. `vk::WHOLE_SIZE` covers the window.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::MappingError`] if the buffer is not mapped or the
    /// range leaves the window, or an error if the flush fails.
    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> RhiResult<()> {
        if let Some(range) = self.non_coherent_range(size, offset)? {
            unsafe { self.device.handle().flush_mapped_memory_ranges(&[range])? };
        }
        Ok(())
    }

    /// Makes device writes in the range visible to the host.
    ///
    /// # Errors
    ///
    /// Same conditions as [`flush`](Self::flush).
    pub fn invalidate(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> RhiResult<()> {
        if let Some(range) = self.non_coherent_range(size, offset)? {
            unsafe {
                self.device
                    .handle()
                    .invalidate_mapped_memory_ranges(&[range])?
            };
        }
        Ok(())
    }

    /// Descriptor info covering `size` bytes at `offset`.
    #[inline]
    pub fn descriptor_info(
        &self,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(self.buffer)
            .offset(offset)
            .range(size)
    }

    /// Writes one instance at `index * alignment_size`.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn write_to_index(&mut self, data: &[u8], index: u32) -> RhiResult<()> {
        let (offset, _) = index_range(index, self.alignment_size);
        self.write(data, self.instance_size, offset)
    }

    /// Flushes the instance slot at `index`.
    ///
    /// # Errors
    ///
    /// See [`flush`](Self::flush).
    pub fn flush_index(&self, index: u32) -> RhiResult<()> {
        let (offset, range) = index_range(index, self.alignment_size);
        self.flush(range, offset)
    }

    /// Descriptor info covering the instance slot at `index`.
    #[inline]
    pub fn descriptor_info_for_index(&self, index: u32) -> vk::DescriptorBufferInfo {
        let (offset, range) = index_range(index, self.alignment_size);
        self.descriptor_info(range, offset)
    }

    /// Invalidates the instance slot at `index`.
    ///
    /// # Errors
    ///
    /// See [`invalidate`](Self::invalidate).
    pub fn invalidate_index(&self, index: u32) -> RhiResult<()> {
        let (offset, range) = index_range(index, self.alignment_size);
        self.invalidate(range, offset)
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    #[inline]
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    #[inline]
    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    #[inline]
    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    #[inline]
    pub fn usage_flags(&self) -> vk::BufferUsageFlags {
        self.usage_flags
    }

    #[inline]
    pub fn memory_property_flags(&self) -> vk::MemoryPropertyFlags {
        self.memory_property_flags
    }

    /// Memory range to flush or invalidate, or `None` when the memory is
    /// host coherent and no call is needed.
    fn non_coherent_range(
        &self,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> RhiResult<Option<vk::MappedMemoryRange<'static>>> {
        let window = self.mapped.ok_or_else(|| {
            RhiError::MappingError("Buffer must be mapped to flush or invalidate".to_string())
        })?;
        let (offset, len) = window.clip(size, offset).ok_or_else(|| {
            RhiError::MappingError(format!(
                "Range of {} bytes at {} falls outside mapped window {:?}",
                size, offset, window
            ))
        })?;
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer has no allocation".to_string()))?;

        if allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            return Ok(None);
        }

        let atom = self.device.properties().limits.non_coherent_atom_size;
        let (start, len) = atom_aligned_range(
            allocation.offset() + offset,
            len,
            atom,
            allocation.offset() + allocation.size(),
        );

        Ok(Some(
            vk::MappedMemoryRange::default()
                .memory(unsafe { allocation.memory() })
                .offset(start)
                .size(len),
        ))
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }

        debug!("Destroyed buffer ({} bytes)", self.buffer_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_is_multiple_and_not_smaller() {
        for alignment in [1u64, 2, 4, 8, 16, 32, 64, 128, 256] {
            for size in 1u64..=300 {
                let aligned = align(size, alignment);
                assert_eq!(aligned % alignment, 0, "size {size}, alignment {alignment}");
                assert!(aligned >= size);
                assert!(aligned - size < alignment);
            }
        }
    }

    #[test]
    fn test_align_known_values() {
        assert_eq!(align(100, 256), 256);
        assert_eq!(align(256, 256), 256);
        assert_eq!(align(257, 256), 512);
        assert_eq!(align(12, 4), 12);
    }

    #[test]
    fn test_align_zero_alignment_is_identity() {
        assert_eq!(align(13, 0), 13);
    }

    #[test]
    fn test_index_range_uses_stride() {
        assert_eq!(index_range(0, 256), (0, 256));
        assert_eq!(index_range(3, 256), (768, 256));
        assert_eq!(index_range(1, align(544, 64)), (576, 576));
    }

    #[test]
    fn test_atom_aligned_range_widens_to_atoms() {
        assert_eq!(atom_aligned_range(100, 10, 64, 4096), (64, 64));
        assert_eq!(atom_aligned_range(256, 256, 64, 4096), (256, 256));
        assert_eq!(atom_aligned_range(60, 10, 64, 4096), (0, 128));
    }

    #[test]
    fn test_atom_aligned_range_clamps_to_limit() {
        assert_eq!(atom_aligned_range(0, 10, 64, 32), (0, 32));
        assert_eq!(atom_aligned_range(130, 20, 64, 160), (128, 32));
    }

    #[test]
    fn test_atom_aligned_range_trivial_atom() {
        assert_eq!(atom_aligned_range(7, 5, 1, 100), (7, 5));
        assert_eq!(atom_aligned_range(7, 5, 0, 100), (7, 5));
    }

    #[test]
    fn test_memory_location_from_properties() {
        assert_eq!(
            memory_location(vk::MemoryPropertyFlags::DEVICE_LOCAL),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            memory_location(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            ),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            memory_location(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED
            ),
            MemoryLocation::GpuToCpu
        );
    }

    #[test]
    fn test_mapped_range_resolve() {
        assert_eq!(
            MappedRange::resolve(vk::WHOLE_SIZE, 0, 128),
            Some(MappedRange { offset: 0, size: 128 })
        );
        assert_eq!(
            MappedRange::resolve(vk::WHOLE_SIZE, 32, 128),
            Some(MappedRange { offset: 32, size: 96 })
        );
        assert_eq!(
            MappedRange::resolve(64, 64, 128),
            Some(MappedRange { offset: 64, size: 64 })
        );
        assert_eq!(MappedRange::resolve(64, 100, 128), None);
        assert_eq!(MappedRange::resolve(vk::WHOLE_SIZE, 128, 128), None);
        assert_eq!(MappedRange::resolve(0, 0, 128), None);
    }

    #[test]
    fn test_write_past_partial_mapping_is_rejected() {
        // 128-byte buffer with only its upper half mapped
        let window = MappedRange::resolve(64, 64, 128).unwrap();

        assert_eq!(window.clip(64, 64), Some((64, 64)));
        assert_eq!(window.clip(16, 100), Some((100, 16)));
        assert_eq!(window.clip(vk::WHOLE_SIZE, 0), Some((64, 64)));

        assert_eq!(window.clip(64, 65), None);
        assert_eq!(window.clip(64, 128), None);
        assert_eq!(window.clip(8, 0), None);
        assert_eq!(window.clip(u64::MAX - 1, 64), None);
    }

    #[test]
    fn test_mapped_range_contains() {
        let window = MappedRange { offset: 256, size: 256 };
        assert!(window.contains(256, 256));
        assert!(window.contains(300, 0));
        assert!(!window.contains(255, 1));
        assert!(!window.contains(500, 16));
    }

    #[test]
    fn test_buffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Buffer>();
    }
}
