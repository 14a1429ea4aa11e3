//! CPU-mirrored GPU buffers
//!
//! - [`UniformBuffer`]: one `Pod` value uploaded as a UBO.
//! - [`StorageVecBuffer`]: a growable `Pod` array uploaded as an SSBO.
//!
//! Both publish their backend handle through a [`BufferSlot`] so passes can
//! bind them while recording, before the first upload of the frame.

use bytemuck::Pod;

use crate::errors::Result;
use crate::renderer::backend::{BufferDesc, BufferHandle, GpuBackend};
use crate::renderer::graph::slot::BufferSlot;

// ─── Uniform Buffer ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct UniformBuffer<T: Pod> {
    label: &'static str,
    pub data: T,
    handle: Option<BufferHandle>,
    slot: BufferSlot,
}

impl<T: Pod> UniformBuffer<T> {
    #[must_use]
    pub fn new(label: &'static str, data: T) -> Self {
        Self {
            label,
            data,
            handle: None,
            slot: BufferSlot::new(),
        }
    }

    /// Uploads the CPU copy, creating the GPU buffer on first use.
    pub fn push_update(&mut self, backend: &mut dyn GpuBackend) -> Result<BufferHandle> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = backend.create_buffer(&BufferDesc {
                    label: self.label,
                    size: size_of::<T>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })?;
                self.handle = Some(handle);
                self.slot.set(Some(handle));
                handle
            }
        };
        backend.write_buffer(handle, bytemuck::bytes_of(&self.data));
        Ok(handle)
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(handle) = self.handle.take() {
            backend.free_buffer(handle);
        }
        self.slot.set(None);
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> &BufferSlot {
        &self.slot
    }
}

// ─── Storage Vector Buffer ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct StorageVecBuffer<T: Pod> {
    label: &'static str,
    items: Vec<T>,
    /// Capacity (in elements) of the GPU allocation.
    gpu_capacity: usize,
    handle: Option<BufferHandle>,
    slot: BufferSlot,
}

impl<T: Pod> StorageVecBuffer<T> {
    const MIN_CAPACITY: usize = 16;

    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            items: Vec::new(),
            gpu_capacity: 0,
            handle: None,
            slot: BufferSlot::new(),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Appends `item` and returns its index.
    pub fn append(&mut self, item: T) -> u32 {
        self.items.push(item);
        (self.items.len() - 1) as u32
    }

    #[inline]
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uploads the items, growing the GPU buffer to the next power of two
    /// when it no longer fits.
    pub fn push_update(&mut self, backend: &mut dyn GpuBackend) -> Result<BufferHandle> {
        let needed = self.items.len().max(Self::MIN_CAPACITY);
        let handle = match self.handle {
            Some(handle) if needed <= self.gpu_capacity => handle,
            _ => {
                if let Some(old) = self.handle.take() {
                    backend.free_buffer(old);
                }
                let capacity = needed.next_power_of_two();
                let handle = backend.create_buffer(&BufferDesc {
                    label: self.label,
                    size: (capacity * size_of::<T>()) as u64,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                })?;
                log::debug!("Storage buffer '{}' resized to {capacity} items", self.label);
                self.gpu_capacity = capacity;
                self.handle = Some(handle);
                self.slot.set(Some(handle));
                handle
            }
        };
        if !self.items.is_empty() {
            backend.write_buffer(handle, bytemuck::cast_slice(&self.items));
        }
        Ok(handle)
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(handle) = self.handle.take() {
            backend.free_buffer(handle);
        }
        self.gpu_capacity = 0;
        self.slot.set(None);
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> &BufferSlot {
        &self.slot
    }
}
