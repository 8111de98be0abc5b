// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/frame.rs - NHWC 帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Kouzhao 项目贡献者

use thiserror::Error;

use crate::{
  input::AsNhwcFrame,
  model::{Bound, RawOutput},
};

const RGB_CHANNELS: usize = 3;

/// 口罩检测模型要求的输入边长
pub const MASK_INPUT_SIZE: u32 = 260;

pub type MaskFrame = RgbNhwcFrame<MASK_INPUT_SIZE, MASK_INPUT_SIZE>;

/// 从方形模型输入的归一化坐标映射回原图归一化坐标的仿射变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Remap {
  pub scale_x: f32,
  pub scale_y: f32,
  pub offset_x: f32,
  pub offset_y: f32,
}

impl Default for Remap {
  fn default() -> Self {
    Self::identity()
  }
}

impl Remap {
  pub fn identity() -> Self {
    Self {
      scale_x: 1.0,
      scale_y: 1.0,
      offset_x: 0.0,
      offset_y: 0.0,
    }
  }

  /// 沿较长边两侧等量裁剪出的中心方形区域
  pub fn center_crop(width: u32, height: u32) -> Self {
    if width == 0 || height == 0 {
      return Self::identity();
    }
    let side = width.min(height);
    let (w, h) = (width as f32, height as f32);
    Self {
      scale_x: side as f32 / w,
      scale_y: side as f32 / h,
      offset_x: ((width - side) / 2) as f32 / w,
      offset_y: ((height - side) / 2) as f32 / h,
    }
  }

  pub fn apply(&self, bound: Bound) -> Bound {
    Bound::new(
      bound.x * self.scale_x + self.offset_x,
      bound.y * self.scale_y + self.offset_y,
      bound.width * self.scale_x,
      bound.height * self.scale_y,
    )
  }
}

/// 帧与其原始图像之间的几何关系
pub trait SourceGeometry {
  fn remap(&self) -> Remap;
}

impl SourceGeometry for RawOutput {
  fn remap(&self) -> Remap {
    Remap::identity()
  }
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
  remap: Remap,
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNhwcFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      remap: Remap::identity(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbNhwcFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self {
      data,
      remap: Remap::identity(),
    }
  }
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn with_remap(mut self, remap: Remap) -> Self {
    self.remap = remap;
    self
  }
}

impl<const W: u32, const H: u32> SourceGeometry for RgbNhwcFrame<W, H> {
  fn remap(&self) -> Remap {
    self.remap
  }
}

impl<const W: u32, const H: u32> AsMut<[u8]> for RgbNhwcFrame<W, H> {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame<W, H> for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}
