//! 记录所有操作的假 backend，用于在没有 GPU 的情况下测试加速结构的构建流程

use ash::vk;
use prism_gfx::raytracing::acceleration::GfxBlasTriangles;
use prism_scene::texture::TextureImage;

use crate::{
    error::RenderResult,
    scene_accel::backend::{AccelBackend, BufferKind},
};

#[derive(Debug)]
pub struct MockBuffer {
    pub id: u64,
    pub kind: BufferKind,
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAccelLevel {
    Bottom,
    Top,
}

#[derive(Debug)]
pub struct MockAccel {
    pub id: u64,
    pub level: MockAccelLevel,
    pub name: String,
}

#[derive(Debug)]
pub struct MockTexture {
    pub id: u64,
    pub image: TextureImage,
}

#[derive(Default)]
pub struct RecordingBackend {
    pub next_id: u64,
    pub uploads: Vec<(BufferKind, String)>,
    pub blas_builds: Vec<GfxBlasTriangles>,
    /// 每次 TLAS 构建的 (instance buffer id, instance count)
    pub tlas_builds: Vec<(u64, u32)>,
    pub textures: Vec<TextureImage>,
    /// 按顺序记录的销毁操作
    pub destroyed: Vec<String>,
    /// 第几次 texture 上传时失败
    pub fail_texture_at: Option<usize>,
}

impl RecordingBackend {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    #[inline]
    pub fn address_of(id: u64) -> vk::DeviceAddress {
        id * 0x1000
    }

    pub fn upload_count(&self, kind: BufferKind) -> usize {
        self.uploads.iter().filter(|(k, _)| *k == kind).count()
    }
}

impl AccelBackend for RecordingBackend {
    type Buffer = MockBuffer;
    type Accel = MockAccel;
    type Texture = MockTexture;

    fn upload_buffer(&mut self, kind: BufferKind, bytes: &[u8], name: &str) -> RenderResult<MockBuffer> {
        assert!(!bytes.is_empty(), "zero sized buffer: {}", name);
        self.uploads.push((kind, name.to_string()));
        Ok(MockBuffer {
            id: self.next_id(),
            kind,
            name: name.to_string(),
            bytes: bytes.to_vec(),
        })
    }

    fn buffer_address(&self, buffer: &MockBuffer) -> vk::DeviceAddress {
        Self::address_of(buffer.id)
    }

    fn build_blas(&mut self, triangles: &GfxBlasTriangles, name: &str) -> RenderResult<MockAccel> {
        self.blas_builds.push(*triangles);
        Ok(MockAccel {
            id: self.next_id(),
            level: MockAccelLevel::Bottom,
            name: name.to_string(),
        })
    }

    fn build_tlas(&mut self, instances: &MockBuffer, instance_count: u32, name: &str) -> RenderResult<MockAccel> {
        self.tlas_builds.push((instances.id, instance_count));
        Ok(MockAccel {
            id: self.next_id(),
            level: MockAccelLevel::Top,
            name: name.to_string(),
        })
    }

    fn accel_address(&self, accel: &MockAccel) -> vk::DeviceAddress {
        Self::address_of(accel.id)
    }

    fn upload_texture(&mut self, texture: &TextureImage, name: &str) -> RenderResult<MockTexture> {
        if self.fail_texture_at == Some(self.textures.len()) {
            return Err(prism_gfx::error::GfxError::NotMapped(name.to_string()).into());
        }
        self.textures.push(texture.clone());
        Ok(MockTexture {
            id: self.next_id(),
            image: texture.clone(),
        })
    }

    fn destroy_buffer(&mut self, buffer: MockBuffer) {
        self.destroyed.push(format!("buffer:{}", buffer.name));
    }

    fn destroy_accel(&mut self, accel: MockAccel) {
        self.destroyed.push(format!("accel:{}", accel.name));
    }

    fn destroy_texture(&mut self, texture: MockTexture) {
        self.destroyed.push(format!("texture:{}", texture.id));
    }
}
