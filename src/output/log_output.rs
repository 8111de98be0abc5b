// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/output/log_output.rs - 日志输出
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceGeometry,
  model::{DetectResult, WithLabel},
  output::{Render, to_source_coordinates},
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 通过 tracing 输出每一个检测结果
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(LogOutput)
  }
}

impl<F: SourceGeometry> Render<F, DetectResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    if result.is_empty() {
      info!("本帧未检测到人脸");
      return Ok(());
    }

    info!("检测到 {} 张人脸", result.len());
    for item in to_source_coordinates(result, frame.remap()) {
      info!(
        "  - {}: {:.2}% at ({:.3}, {:.3}, {:.3}x{:.3})",
        item.kind.to_label_str(),
        item.score * 100.0,
        item.bound.x,
        item.bound.y,
        item.bound.width,
        item.bound.height
      );
    }
    Ok(())
  }
}
