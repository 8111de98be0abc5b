// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/input.rs - 图像/张量输入
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
use tracing::info;

use crate::FromUrlWithScheme;

pub trait AsNhwcFrame<const W: u32, const H: u32> {
  fn as_nhwc(&self) -> &[u8];
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, ImageFileInputNhwc};

#[cfg(feature = "read_image_file")]
mod resize;
#[cfg(feature = "read_image_file")]
pub use self::resize::{ResizeMode, fit_to_square};

mod tensor_dump;
pub use self::tensor_dump::{TensorDumpInput, TensorDumpInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("推理输出记录错误: {0}")]
  TensorDumpInputError(#[from] TensorDumpInputError),
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
}

/// 按 URL 打开指定类型的输入，方案不符时直接报错
pub fn open_input<T>(url: &url::Url) -> Result<T, InputError>
where
  T: FromUrlWithScheme,
  InputError: From<T::Error>,
{
  if url.scheme() != T::SCHEME {
    return Err(InputError::SchemeMismatch {
      expected: T::SCHEME,
      actual: url.scheme().to_string(),
    });
  }
  info!("打开输入: {}", url);
  Ok(T::from_url(url)?)
}
