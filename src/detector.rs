// 该文件是 Paizhao （牌照） 项目的一部分。
// src/detector.rs - 车牌检测适配器
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  geometry::suppress_overlaps,
  model::{Detection, PlateModel, normalize_score},
};

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("车牌检测模型推理失败: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 车牌检测器
pub struct PlateDetector<M> {
  model: M,
  /// 最低置信度
  min_score: f32,
  /// NMS IoU 阈值
  iou_threshold: f32,
  /// 单幅图像最多保留的车牌数
  max_plates: usize,
}

impl<M> PlateDetector<M> {
  pub fn new(model: M, min_score: f32, iou_threshold: f32, max_plates: usize) -> Self {
    Self {
      model,
      min_score,
      iou_threshold,
      max_plates,
    }
  }

  pub fn model(&self) -> &M {
    &self.model
  }
}

impl<M> PlateDetector<M>
where
  M: PlateModel,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  /// 检测图像中的车牌
  ///
  /// 返回的检测结果已截断到图像范围内，经过阈值过滤与 NMS，
  /// 并按置信度降序排列。没有车牌时返回空序列。
  pub fn detect_plates(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
    let raw = self
      .model
      .infer(image)
      .map_err(|e| DetectionError::Inference(Box::new(e)))?;
    debug!("车牌检测模型输出 {} 个候选框", raw.len());

    let (width, height) = image.dimensions();
    let candidates: Vec<Detection> = raw
      .into_iter()
      .filter_map(|det| {
        let score = normalize_score(det.score)?;
        let bbox = det.bbox.clamp_to(width, height)?;
        (score >= self.min_score).then_some(Detection::new(bbox, score))
      })
      .collect();

    let mut plates = suppress_overlaps(candidates, self.iou_threshold);
    plates.truncate(self.max_plates);
    debug!("NMS 后保留 {} 个车牌", plates.len());

    Ok(plates)
  }
}
