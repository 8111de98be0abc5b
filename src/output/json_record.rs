// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/output/json_record.rs - JSON Lines 记录输出
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

use std::{
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  path::PathBuf,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceGeometry,
  model::{DetectItem, DetectResult},
  output::{Render, to_source_coordinates},
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("记录文件路径为空")]
  EmptyPath,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("记录状态锁已损坏")]
  LockPoisoned,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  timestamp: DateTime<Utc>,
  frame: u64,
  detections: &'a [DetectItem],
}

struct RecordState {
  frame: u64,
  writer: BufWriter<File>,
}

/// 每帧一行 JSON，坐标已映射回原图
///
/// `jsonl:///var/log/kouzhao/detections.jsonl?always`
pub struct JsonRecordOutput {
  path: PathBuf,
  state: Arc<Mutex<RecordState>>,
  always: bool,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch(url.scheme().to_string()));
    }

    let always = url.query_pairs().any(|(k, _)| k == "always");
    Self::create(PathBuf::from(url.path()), always)
  }
}

impl JsonRecordOutput {
  pub fn create(path: PathBuf, always: bool) -> Result<Self, JsonRecordOutputError> {
    if path.file_name().is_none() {
      return Err(JsonRecordOutputError::EmptyPath);
    }
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
      && !parent.exists()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("检测结果记录到: {}", path.display());

    Ok(Self {
      path,
      state: Arc::new(Mutex::new(RecordState {
        frame: 0,
        writer: BufWriter::new(file),
      })),
      always,
    })
  }

  pub fn path(&self) -> &PathBuf {
    &self.path
  }
}

impl<F: SourceGeometry> Render<F, DetectResult> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    let mut state = self
      .state
      .lock()
      .map_err(|_| JsonRecordOutputError::LockPoisoned)?;
    state.frame += 1;

    if !self.always && result.is_empty() {
      return Ok(());
    }

    let detections = to_source_coordinates(result, frame.remap());
    let record = FrameRecord {
      timestamp: Utc::now(),
      frame: state.frame,
      detections: &detections,
    };

    serde_json::to_writer(&mut state.writer, &record)?;
    state.writer.write_all(b"\n")?;
    state.writer.flush()?;
    debug!("第 {} 帧记录 {} 条检测结果", record.frame, detections.len());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::Remap,
    model::{Bound, MaskStatus},
  };

  struct Cropped;

  impl SourceGeometry for Cropped {
    fn remap(&self) -> Remap {
      Remap::center_crop(200, 400)
    }
  }

  fn one_face() -> DetectResult {
    DetectResult::from(vec![DetectItem {
      kind: MaskStatus::NoMask,
      score: 0.9,
      bound: Bound::new(0.0, 0.0, 1.0, 1.0),
    }])
  }

  fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
      .unwrap()
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect()
  }

  #[test]
  fn writes_remapped_detections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    output.render_result(&Cropped, &DetectResult::empty()).unwrap();
    output.render_result(&Cropped, &one_face()).unwrap();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["frame"], 2);
    let detection = &lines[0]["detections"][0];
    assert_eq!(detection["kind"], "no_mask");
    assert_eq!(detection["bound"]["y"].as_f64(), Some(0.25));
    assert_eq!(detection["bound"]["height"].as_f64(), Some(0.5));
  }

  #[test]
  fn always_records_empty_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.jsonl");
    let url = Url::parse(&format!("jsonl://{}?always", path.display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    output.render_result(&Cropped, &DetectResult::empty()).unwrap();
    output.render_result(&Cropped, &DetectResult::empty()).unwrap();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["detections"].as_array().map(Vec::len), Some(0));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("file:///tmp/out.jsonl").unwrap();
    assert!(matches!(
      JsonRecordOutput::from_url(&url),
      Err(JsonRecordOutputError::SchemeMismatch(_))
    ));
  }
}
