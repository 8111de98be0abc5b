// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/task.rs - 任务循环
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
  sync::mpsc::{self, Receiver, TrySendError},
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 注册 Ctrl-C 处理，收到信号后 30 秒仍未退出则强制结束进程
///
/// 每个进程只能注册一次，重复注册时返回的接收端永远不会收到信号。
fn interrupt_signal() -> Receiver<()> {
  let (tx, rx) = mpsc::channel();
  let registered = ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  });
  if let Err(e) = registered {
    warn!("无法注册 Ctrl-C 处理: {}", e);
  }
  rx
}

fn reached(frame_number: Option<usize>, frame_index: usize) -> bool {
  frame_number.is_some_and(|n| frame_index >= n)
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("检测完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧处理直到输入耗尽、达到指定帧数或收到中断信号
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = interrupt_signal();

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      debug!("处理第 {} 帧", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      debug!("检测完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if reached(self.frame_number, frame_index) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

/// 检测在独立线程中进行，只保留最新的一帧
///
/// 输入线程通过单槽通道把帧交给检测线程，检测线程忙碌且槽位已满时，
/// 新到达的帧直接丢弃并计数。
#[derive(Default, Debug)]
pub struct LatestFrameTask {
  frame_number: Option<usize>,
}

impl LatestFrameTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F: Send,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME> + Send,
  O: Render<F, D, Error = RE> + Send,
> Task<I, M, O> for LatestFrameTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务（丢弃过期帧）...");
    let interrupt = interrupt_signal();
    let (tx, rx) = mpsc::sync_channel::<F>(1);

    thread::scope(|scope| -> anyhow::Result<()> {
      let worker = scope.spawn(move || -> anyhow::Result<usize> {
        let mut processed = 0usize;
        for frame in rx {
          let now = Instant::now();
          let result = model.infer(&frame)?;
          output.render_result(&frame, &result)?;
          processed += 1;
          debug!("检测完成，耗时: {:.2?}", now.elapsed());
        }
        Ok(processed)
      });

      let mut frame_index = 0usize;
      let mut dropped = 0usize;
      for frame in input {
        frame_index = frame_index.wrapping_add(1);
        match tx.try_send(frame) {
          Ok(()) => {}
          Err(TrySendError::Full(_)) => {
            dropped += 1;
            warn!("检测线程忙碌，丢弃第 {} 帧（累计 {} 帧）", frame_index, dropped);
          }
          Err(TrySendError::Disconnected(_)) => {
            warn!("检测线程已退出，停止读取输入");
            break;
          }
        }
        if reached(self.frame_number, frame_index) {
          info!("达到指定帧数 {}, 退出任务循环", frame_index);
          break;
        }
        if interrupt.try_recv().is_ok() {
          warn!("中断信号接收，退出任务循环");
          break;
        }
      }
      drop(tx);

      let processed = worker
        .join()
        .map_err(|_| anyhow::anyhow!("检测线程异常退出"))??;
      info!(
        "任务完成，读取 {} 帧，检测 {} 帧，丢弃 {} 帧",
        frame_index, processed, dropped
      );
      Ok(())
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{
    convert::Infallible,
    sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
    },
  };

  use thiserror::Error;

  use super::*;

  struct Echo {
    delay: Duration,
  }

  impl Model for Echo {
    type Input = u32;
    type Output = u32;
    type Error = Infallible;

    fn infer(&self, input: &u32) -> Result<u32, Infallible> {
      thread::sleep(self.delay);
      Ok(*input * 2)
    }
  }

  #[derive(Error, Debug)]
  #[error("结果不一致")]
  struct Mismatch;

  #[derive(Clone, Default)]
  struct Counter {
    rendered: Arc<AtomicUsize>,
  }

  impl Render<u32, u32> for Counter {
    type Error = Mismatch;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Mismatch> {
      if *result != frame * 2 {
        return Err(Mismatch);
      }
      self.rendered.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  fn echo() -> Echo {
    Echo {
      delay: Duration::ZERO,
    }
  }

  #[test]
  fn one_shot_renders_first_frame_only() {
    let counter = Counter::default();
    OneShotTask
      .run_task(vec![1u32, 2, 3].into_iter(), echo(), counter.clone())
      .unwrap();
    assert_eq!(counter.rendered.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn one_shot_fails_without_frames() {
    let result = OneShotTask.run_task(std::iter::empty::<u32>(), echo(), Counter::default());
    assert!(result.is_err());
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let counter = Counter::default();
    ContinuousTask::default()
      .with_frame_number(Some(4))
      .run_task(0u32..100, echo(), counter.clone())
      .unwrap();
    assert_eq!(counter.rendered.load(Ordering::SeqCst), 4);
  }

  #[test]
  fn continuous_propagates_render_errors() {
    struct Broken;
    impl Render<u32, u32> for Broken {
      type Error = Mismatch;
      fn render_result(&self, _frame: &u32, _result: &u32) -> Result<(), Mismatch> {
        Err(Mismatch)
      }
    }
    assert!(
      ContinuousTask::default()
        .run_task(0u32..3, echo(), Broken)
        .is_err()
    );
  }

  #[test]
  fn latest_frame_drops_frames_while_busy() {
    let counter = Counter::default();
    let slow = Echo {
      delay: Duration::from_millis(20),
    };
    LatestFrameTask::default()
      .run_task(0u32..50, slow, counter.clone())
      .unwrap();
    let rendered = counter.rendered.load(Ordering::SeqCst);
    assert!(rendered >= 1);
    assert!(rendered < 50);
  }

  #[test]
  fn latest_frame_keeps_every_frame_when_idle() {
    let counter = Counter::default();
    let frames = (0u32..5).inspect(|_| thread::sleep(Duration::from_millis(20)));
    LatestFrameTask::default()
      .run_task(frames, echo(), counter.clone())
      .unwrap();
    assert_eq!(counter.rendered.load(Ordering::SeqCst), 5);
  }
}
