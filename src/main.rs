// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/main.rs - 回放录制的推理输出
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use kouzhao::{
  FromUrl,
  args::DetectorArgs,
  input::{TensorDumpInput, open_input},
  model::{AnchorTable, DetectorConfig, MaskDetector, ReplayEngine},
  output::OutputWrapper,
  task::{ContinuousTask, LatestFrameTask, Task},
};

/// 对录制的模型输出逐帧执行口罩检测后处理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理输出记录，`tensor:///path/to/outputs.jsonl`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，`log:` 或 `jsonl:///path/to/detections.jsonl[?always]`
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,

  #[command(flatten)]
  pub detector: DetectorArgs,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 检测跟不上输入时丢弃过期帧
  #[arg(long)]
  pub drop_late_frames: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("锚框来源: {}", args.detector.anchors);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let anchors = AnchorTable::from_url(&args.detector.anchors)?;
  info!("锚框数量: {}", anchors.len());
  let config = DetectorConfig::from(&args.detector);
  let model = MaskDetector::new(ReplayEngine, anchors, config)?;

  let input: TensorDumpInput = open_input(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  if args.drop_late_frames {
    LatestFrameTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input, model, output)?;
  } else {
    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input, model, output)?;
  }

  Ok(())
}
