// 该文件是 Xianmang （闲忙） 项目的一部分。
// tests/monitor_cycle.rs - 监测周期集成测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{cell::RefCell, collections::VecDeque, io, time::Duration};

use image::{Rgb, RgbImage};
use xianmang::{
  feature::FeatureExtractor,
  frame::Frame,
  fusion::{Calibration, ScoreFusion},
  input::{CaptureError, FrameSource},
  output::Sink,
  record::{BusynessRecord, RecordTags},
  task::{ContinuousTask, CycleError, CycleStage, Monitor, OneShotTask, RunSummary, Task},
};

/// 按脚本返回帧；`None` 表示这一次采集失败
struct Scripted(VecDeque<Option<RgbImage>>);

impl Scripted {
  fn new(script: impl IntoIterator<Item = Option<RgbImage>>) -> Self {
    Self(script.into_iter().collect())
  }
}

impl FrameSource for Scripted {
  fn capture(&mut self) -> Result<Frame, CaptureError> {
    match self.0.pop_front().flatten() {
      Some(image) => Ok(Frame::now(image)?),
      None => Err(CaptureError::DeviceUnavailable("camera busy".to_string())),
    }
  }
}

/// 记录每次发布；第 `fail_on` 次（从 1 开始）发布返回错误
#[derive(Default)]
struct Recorder {
  fail_on: Vec<usize>,
  attempts: RefCell<usize>,
  rows: RefCell<Vec<(BusynessRecord, RecordTags)>>,
}

impl Sink for Recorder {
  type Error = io::Error;

  fn publish(&self, record: &BusynessRecord, tags: &RecordTags) -> Result<(), Self::Error> {
    let attempt = {
      let mut attempts = self.attempts.borrow_mut();
      *attempts += 1;
      *attempts
    };
    if self.fail_on.contains(&attempt) {
      return Err(io::Error::new(io::ErrorKind::TimedOut, "upload timed out"));
    }
    self.rows.borrow_mut().push((record.clone(), tags.clone()));
    Ok(())
  }
}

fn gray(value: u8) -> Option<RgbImage> {
  Some(RgbImage::from_pixel(48, 32, Rgb([value; 3])))
}

fn busy() -> Option<RgbImage> {
  Some(RgbImage::from_fn(48, 32, |x, y| {
    if (x / 8 + y / 8) % 2 == 0 && x % 8 < 6 && y % 8 < 6 {
      Rgb([250, 30, 30])
    } else {
      Rgb([10, 10, 120])
    }
  }))
}

fn monitor(source: Scripted, sink: Recorder) -> Monitor<Scripted, Recorder> {
  Monitor::new(source, FeatureExtractor::default(), ScoreFusion::default(), sink)
    .with_tags(RecordTags::new(Some("integration"), Some("Test Camera")))
}

fn continuous(cycles: u64) -> ContinuousTask {
  ContinuousTask::default()
    .with_interval(Duration::ZERO)
    .with_max_cycles(Some(cycles))
}

#[test]
fn capture_failure_does_not_block_next_cycle() {
  let mut m = monitor(
    Scripted::new([gray(50), None, gray(50)]),
    Recorder::default(),
  );
  let summary = continuous(3).run_task(&mut m).unwrap();
  assert_eq!(
    summary,
    RunSummary {
      cycles: 3,
      published: 2,
      failed: 1
    }
  );
  assert_eq!(m.sink().rows.borrow().len(), 2);
  // 失败的采集不会更新背景
  assert_eq!(m.extractor().motion_model().observed(), 2);
}

#[test]
fn publish_failure_is_not_retried() {
  let sink = Recorder {
    fail_on: vec![2],
    ..Recorder::default()
  };
  let mut m = monitor(Scripted::new([gray(50), gray(50), gray(50)]), sink);
  let summary = continuous(3).run_task(&mut m).unwrap();
  assert_eq!(summary.published, 2);
  assert_eq!(summary.failed, 1);
  assert_eq!(*m.sink().attempts.borrow(), 3);
  assert_eq!(m.sink().rows.borrow().len(), 2);
}

#[test]
fn one_shot_failure_is_an_error() {
  let mut m = monitor(Scripted::new([None]), Recorder::default());
  let err = OneShotTask.run_task(&mut m).unwrap_err();
  assert_eq!(err.stage(), CycleStage::Capturing);
  assert!(matches!(err, CycleError::Capture(_)));

  let sink = Recorder {
    fail_on: vec![1],
    ..Recorder::default()
  };
  let mut m = monitor(Scripted::new([gray(0)]), sink);
  let err = OneShotTask.run_task(&mut m).unwrap_err();
  assert_eq!(err.stage(), CycleStage::Publishing);
}

#[test]
fn records_carry_tags_and_valid_scores() {
  let mut m = monitor(
    Scripted::new([gray(20), busy(), gray(20), busy()]),
    Recorder::default(),
  );
  continuous(4).run_task(&mut m).unwrap();

  let rows = m.sink().rows.borrow();
  assert_eq!(rows.len(), 4);
  for (record, tags) in rows.iter() {
    assert!((1..=10).contains(&record.score));
    assert!((0.0..=1.0).contains(&record.combined_raw));
    assert_eq!(tags.camera_name.as_deref(), Some("Test Camera"));
    assert_eq!(tags.notes.as_deref(), Some("integration"));
  }
  // 纯色首帧没有任何特征
  assert_eq!(rows[0].0.score, 1);
  assert!(rows[1].0.combined_raw > rows[0].0.combined_raw);
  assert!(rows[1].0.features.motion_ratio > 0.0);
}

#[test]
fn fusion_saturates_at_both_ends() {
  let calibration = Calibration::default();
  let fusion = ScoreFusion::default();
  assert_eq!(fusion.fuse(&calibration.floor_features()).unwrap().score, 1);
  assert_eq!(fusion.fuse(&calibration.ceiling_features()).unwrap().score, 10);
}
