// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/input/resize.rs - 将任意尺寸图像调整为方形模型输入
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

use std::str::FromStr;

use image::{RgbImage, imageops::FilterType};

use crate::frame::Remap;

/// 非方形图像转为方形模型输入的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizeMode {
  /// 沿较长边两侧等量裁剪，不变形，但只检测中心方形区域
  #[default]
  CenterCrop,
  /// 直接拉伸为方形，整幅图像都参与检测，但会变形
  Stretch,
}

impl FromStr for ResizeMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "center_crop" | "center-crop" | "crop" => Ok(ResizeMode::CenterCrop),
      "stretch" => Ok(ResizeMode::Stretch),
      other => Err(format!("未知的缩放方式: {}", other)),
    }
  }
}

/// 调整为 `side` x `side`，同时返回把检测结果映射回原图的变换；空图像返回 `None`
pub fn fit_to_square(image: &RgbImage, side: u32, mode: ResizeMode) -> Option<(RgbImage, Remap)> {
  let (width, height) = image.dimensions();
  if width == 0 || height == 0 || side == 0 {
    return None;
  }

  match mode {
    ResizeMode::CenterCrop => {
      let crop = width.min(height);
      let x = (width - crop) / 2;
      let y = (height - crop) / 2;
      let cropped = image::imageops::crop_imm(image, x, y, crop, crop).to_image();
      let resized = image::imageops::resize(&cropped, side, side, FilterType::Triangle);
      Some((resized, Remap::center_crop(width, height)))
    }
    ResizeMode::Stretch => {
      let resized = image::imageops::resize(image, side, side, FilterType::Triangle);
      Some((resized, Remap::identity()))
    }
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;

  #[test]
  fn parses_modes() {
    assert_eq!("stretch".parse::<ResizeMode>(), Ok(ResizeMode::Stretch));
    assert_eq!("center_crop".parse::<ResizeMode>(), Ok(ResizeMode::CenterCrop));
    assert!("fill".parse::<ResizeMode>().is_err());
  }

  #[test]
  fn center_crop_keeps_middle_square() {
    // 左右两侧为黑色，中间 100x100 为白色
    let image = RgbImage::from_fn(300, 100, |x, _| {
      if (100..200).contains(&x) {
        Rgb([255, 255, 255])
      } else {
        Rgb([0, 0, 0])
      }
    });
    let (square, remap) = fit_to_square(&image, 20, ResizeMode::CenterCrop).unwrap();
    assert_eq!(square.dimensions(), (20, 20));
    assert!(square.get_pixel(0, 0)[0] > 250);
    assert!(square.get_pixel(19, 19)[0] > 250);
    assert!((remap.offset_x - 1.0 / 3.0).abs() < 1e-6);
    assert!((remap.scale_x - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn stretch_uses_identity_remap() {
    let image = RgbImage::new(64, 32);
    let (square, remap) = fit_to_square(&image, 16, ResizeMode::Stretch).unwrap();
    assert_eq!(square.dimensions(), (16, 16));
    assert_eq!(remap, Remap::identity());
  }

  #[test]
  fn empty_image_is_rejected() {
    assert!(fit_to_square(&RgbImage::new(0, 10), 16, ResizeMode::CenterCrop).is_none());
  }
}
