// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameError, Remap, RgbNhwcFrame},
  input::resize::{ResizeMode, fit_to_square},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("图像尺寸为空")]
  EmptyImage,
  #[error("未知的缩放方式: {0}")]
  InvalidResizeMode(String),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
}

/// 读取单张图像，并按 `ResizeMode` 调整为 `W` x `H` 的模型输入
pub struct ImageFileInput<const W: u32, const H: u32> {
  image: Option<RgbImage>,
  mode: ResizeMode,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  /// `image:///path/to/photo.jpg?resize=stretch`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let mode = match url.query_pairs().find(|(k, _)| k == "resize") {
      Some((_, v)) => v
        .parse::<ResizeMode>()
        .map_err(|_| ImageFileInputError::InvalidResizeMode(v.to_string()))?,
      None => ResizeMode::default(),
    };

    let image = ImageReader::open(url.path())?.decode()?.to_rgb8();
    Self::from_image(image, mode)
  }
}

impl<const W: u32, const H: u32> ImageFileInput<W, H> {
  pub fn from_image(image: RgbImage, mode: ResizeMode) -> Result<Self, ImageFileInputError> {
    if image.width() == 0 || image.height() == 0 {
      return Err(ImageFileInputError::EmptyImage);
    }
    debug!("输入图像尺寸: {}x{}, 缩放方式: {:?}", image.width(), image.height(), mode);
    Ok(Self {
      image: Some(image),
      mode,
    })
  }

  pub fn with_mode(mut self, mode: ResizeMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn into_nhwc(self) -> ImageFileInputNhwc<W, H> {
    ImageFileInputNhwc { inner: self }
  }

  fn take_frame(&mut self) -> Option<Result<RgbNhwcFrame<W, H>, ImageFileInputError>> {
    let image = self.image.take()?;
    Some(to_frame(&image, self.mode))
  }
}

fn to_frame<const W: u32, const H: u32>(
  image: &RgbImage,
  mode: ResizeMode,
) -> Result<RgbNhwcFrame<W, H>, ImageFileInputError> {
  // 非方形模型输入只支持拉伸
  let fitted = if W == H {
    fit_to_square(image, W, mode)
  } else {
    let resized = image::imageops::resize(image, W, H, FilterType::Triangle);
    Some((resized, Remap::identity()))
  };
  let (resized, remap) = fitted.ok_or(ImageFileInputError::EmptyImage)?;

  let frame = RgbNhwcFrame::try_from(resized.into_raw())?;
  Ok(frame.with_remap(remap))
}

pub struct ImageFileInputNhwc<const W: u32, const H: u32> {
  inner: ImageFileInput<W, H>,
}

impl<const W: u32, const H: u32> Iterator for ImageFileInputNhwc<W, H> {
  type Item = RgbNhwcFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    match self.inner.take_frame()? {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("图像转换失败: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;
  use crate::{frame::SourceGeometry, input::AsNhwcFrame};

  #[test]
  fn yields_one_resized_frame() {
    let image = RgbImage::from_pixel(40, 80, Rgb([10, 20, 30]));
    let input = ImageFileInput::<8, 8>::from_image(image, ResizeMode::CenterCrop).unwrap();
    let frames: Vec<_> = input.into_nhwc().collect();
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame.as_nhwc().len(), 8 * 8 * 3);
    for (value, expected) in frame.as_nhwc()[..3].iter().zip([10u8, 20, 30]) {
      assert!(value.abs_diff(expected) <= 1);
    }
    assert!((frame.remap().scale_y - 0.5).abs() < 1e-6);
  }

  #[test]
  fn reads_image_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("face.png");
    RgbImage::from_pixel(16, 16, Rgb([200, 100, 50]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}?resize=stretch", path.display())).unwrap();
    let input = ImageFileInput::<4, 4>::from_url(&url).unwrap();
    assert_eq!(input.mode, ResizeMode::Stretch);
    assert_eq!(input.into_nhwc().count(), 1);
  }

  #[test]
  fn rejects_wrong_scheme_and_mode() {
    let url = Url::parse("file:///tmp/face.png").unwrap();
    assert!(matches!(
      ImageFileInput::<4, 4>::from_url(&url),
      Err(ImageFileInputError::SchemeMismatch(_))
    ));
    let url = Url::parse("image:///tmp/face.png?resize=fill").unwrap();
    assert!(matches!(
      ImageFileInput::<4, 4>::from_url(&url),
      Err(ImageFileInputError::InvalidResizeMode(_))
    ));
  }
}
