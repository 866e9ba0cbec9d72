use ash::vk;
use prism_gfx::raytracing::acceleration::GfxBlasTriangles;
use prism_scene::texture::TextureImage;

use crate::error::RenderResult;

/// buffer 的用途，决定 buffer 的 usage 与对齐
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// vertex / index buffer，作为 BLAS 的构建输入，也会被 shader 通过 device address 读取
    Geometry,
    /// mesh / instance 间接索引表
    IndirectionTable,
    MaterialTable,
    /// TLAS 的 instance 数组
    AccelInstances,
}

/// 场景加速结构所依赖的 GPU 操作
///
/// 所有操作都是同步的：返回时数据已经对 GPU 可见，或者构建已经完成
pub trait AccelBackend {
    type Buffer;
    type Accel;
    type Texture;

    /// 创建 device local 的 buffer，并同步写入数据
    fn upload_buffer(&mut self, kind: BufferKind, bytes: &[u8], name: &str) -> RenderResult<Self::Buffer>;
    fn buffer_address(&self, buffer: &Self::Buffer) -> vk::DeviceAddress;

    fn build_blas(&mut self, triangles: &GfxBlasTriangles, name: &str) -> RenderResult<Self::Accel>;
    /// `instance_count` 可以为 0，此时 `instances` 中只有一个全 0 的 instance
    fn build_tlas(&mut self, instances: &Self::Buffer, instance_count: u32, name: &str) -> RenderResult<Self::Accel>;
    fn accel_address(&self, accel: &Self::Accel) -> vk::DeviceAddress;

    /// 上传 RGBA8 贴图
    fn upload_texture(&mut self, texture: &TextureImage, name: &str) -> RenderResult<Self::Texture>;

    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    fn destroy_accel(&mut self, accel: Self::Accel);
    fn destroy_texture(&mut self, texture: Self::Texture);
}
