use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, sync::GfxSemaphore},
    error::GfxResult,
    gfx::Gfx,
    swapchain::surface::GfxSurface,
};

/// 获取 swapchain image 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxAcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    /// swapchain 已经失效，本帧不应该继续录制
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxPresentOutcome {
    Presented { suboptimal: bool },
    OutOfDate,
}

pub struct GfxSwapchainImageInfo {
    pub image_extent: vk::Extent2D,
    pub image_cnt: usize,
    pub image_format: vk::Format,
}

pub struct GfxRenderSwapchain {
    surface: Option<GfxSurface>,
    swapchain_handle: vk::SwapchainKHR,

    swapchain_images: Vec<vk::Image>,

    color_format: vk::Format,
    swapchain_extent: vk::Extent2D,
}

// new & init
impl GfxRenderSwapchain {
    pub fn new(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
        present_mode: vk::PresentModeKHR,
        window_physical_extent: vk::Extent2D,
    ) -> GfxResult<Self> {
        let surface = GfxSurface::new(raw_display_handle, raw_window_handle)?;
        let surface_capabilities = surface.get_capabilities()?;

        let extent = Self::calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height
        );

        let surface_format = Self::choose_surface_format(&surface.get_formats()?);
        let present_mode = Self::choose_present_mode(&surface.get_present_modes()?, present_mode);

        let swapchain_handle = Self::create_swapchain(&surface, &surface_capabilities, surface_format, extent, present_mode)?;
        let images = unsafe { Gfx::get().gfx_device().swapchain().get_swapchain_images(swapchain_handle)? };
        log::info!("swapchain created with {} images, format {:?}", images.len(), surface_format.format);

        Ok(Self {
            surface: Some(surface),
            swapchain_handle,
            swapchain_images: images,
            swapchain_extent: extent,
            color_format: surface_format.format,
        })
    }

    fn create_swapchain(
        surface: &GfxSurface,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        extent: vk::Extent2D,
        present_mode: vk::PresentModeKHR,
    ) -> GfxResult<vk::SwapchainKHR> {
        // max_image_count == 0，表示不限制 image 数量
        let image_count = if surface_capabilities.max_image_count == 0 {
            surface_capabilities.min_image_count + 1
        } else {
            u32::min(surface_capabilities.max_image_count, surface_capabilities.min_image_count + 1)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // 光追结果通过 blit 写入 swapchain image
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        let gfx_device = Gfx::get().gfx_device();
        let swapchain_handle = unsafe { gfx_device.swapchain().create_swapchain(&create_info, None)? };
        gfx_device.set_object_debug_name(swapchain_handle, "main");
        Ok(swapchain_handle)
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn present_images(&self) -> &[vk::Image] {
        &self.swapchain_images
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain_images.len()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    #[inline]
    pub fn image_infos(&self) -> GfxSwapchainImageInfo {
        GfxSwapchainImageInfo {
            image_extent: self.swapchain_extent,
            image_cnt: self.swapchain_images.len(),
            image_format: self.color_format,
        }
    }
}

// tools
impl GfxRenderSwapchain {
    /// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
    pub fn calculate_swapchain_extent(
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        window_physical_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        let surface_extent = surface_capabilities.current_extent;
        if surface_extent.width == 0xFFFFFFFF || surface_extent.height == 0xFFFFFFFF {
            let width = window_physical_extent
                .width
                .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
            let height = window_physical_extent
                .height
                .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
            vk::Extent2D { width, height }
        } else {
            surface_extent
        }
    }

    /// 优先使用 B8G8R8A8_UNORM + SRGB_NONLINEAR，否则使用 surface 返回的第一个格式
    pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
        formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| formats.first())
            .copied()
            .unwrap_or(vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            })
    }

    /// FIFO 一定被支持
    pub fn choose_present_mode(supported: &[vk::PresentModeKHR], wanted: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if supported.contains(&wanted) {
            wanted
        } else {
            log::warn!("present mode {:?} is not supported, fallback to FIFO", wanted);
            vk::PresentModeKHR::FIFO
        }
    }
}

// update
impl GfxRenderSwapchain {
    pub fn acquire_next_image(&self, semaphore: &GfxSemaphore) -> GfxResult<GfxAcquireOutcome> {
        let result = unsafe {
            Gfx::get().gfx_device().swapchain().acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                }
                Ok(GfxAcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(GfxAcquireOutcome::OutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn present_image(
        &self,
        queue: &GfxCommandQueue,
        image_index: u32,
        wait_semaphores: &[&GfxSemaphore],
    ) -> GfxResult<GfxPresentOutcome> {
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { Gfx::get().gfx_device().swapchain().queue_present(queue.handle(), &present_info) };
        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    log::warn!("swapchain present image index {} is not optimal", image_index);
                }
                Ok(GfxPresentOutcome::Presented { suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(GfxPresentOutcome::OutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// destroy
impl GfxRenderSwapchain {
    pub fn destroy(mut self) {
        unsafe {
            Gfx::get().gfx_device().swapchain().destroy_swapchain(self.swapchain_handle, None);
        }
        self.swapchain_handle = vk::SwapchainKHR::null();
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }
    }
}
impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.swapchain_handle.is_null(), "GfxRenderSwapchain must be destroyed manually");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let caps = capabilities(vk::Extent2D {
            width: 800,
            height: 600,
        });
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn special_extent_clamps_window_size() {
        let caps = capabilities(vk::Extent2D {
            width: 0xFFFFFFFF,
            height: 0xFFFFFFFF,
        });
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(
            &caps,
            vk::Extent2D {
                width: 10000,
                height: 720,
            },
        );
        assert_eq!((extent.width, extent.height), (4096, 720));
    }

    #[test]
    fn prefers_bgra_unorm_surface_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&formats).format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&formats[..1]).format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn unsupported_present_mode_falls_back_to_fifo() {
        let supported = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&supported, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&supported, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
    }
}
