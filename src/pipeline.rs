// 该文件是 Paizhao （牌照） 项目的一部分。
// src/pipeline.rs - 车牌识别流水线
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

use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
  assembler::PlateAssembler,
  config::{ConfigError, PipelineConfig},
  detector::PlateDetector,
  input::{DecodeError, decode_image},
  model::{CharModel, Device, PlateModel, SegmentModel},
  output::{Draw, FontResource},
  recognizer::CharRecognizer,
  result::PlateResult,
  segmenter::CharSegmenter,
};

/// 启动时一次性构建的不可变能力集合
///
/// 流水线只持有只读状态，模型满足 `Sync` 时可在多个线程间共享并同时调用
/// [`Pipeline::process`]。
pub struct Pipeline<D, S, R> {
  detector: PlateDetector<D>,
  segmenter: CharSegmenter<S>,
  recognizer: CharRecognizer<R>,
  assembler: PlateAssembler,
  device: Device,
  config: PipelineConfig,
}

pub struct PipelineBuilder<D, S, R> {
  detector: D,
  segmenter: S,
  recognizer: R,
  device: Device,
  font: Option<FontResource>,
  config: PipelineConfig,
}

impl<D, S, R> PipelineBuilder<D, S, R> {
  pub fn new(detector: D, segmenter: S, recognizer: R) -> Self {
    Self {
      detector,
      segmenter,
      recognizer,
      device: Device::default(),
      font: None,
      config: PipelineConfig::default(),
    }
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn font(mut self, font: Option<FontResource>) -> Self {
    self.font = font;
    self
  }

  pub fn config(mut self, config: PipelineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build(self) -> Result<Pipeline<D, S, R>, ConfigError> {
    self.config.validate()?;
    let config = self.config;

    info!(
      "构建车牌识别流水线: 设备 {}, 字体 {}",
      self.device,
      if self.font.is_some() { "已加载" } else { "未加载" }
    );
    debug!("流水线配置: {:?}", config);

    Ok(Pipeline {
      detector: PlateDetector::new(
        self.detector,
        config.plate_min_score,
        config.plate_iou_threshold,
        config.max_plates,
      ),
      segmenter: CharSegmenter::new(
        self.segmenter,
        config.char_min_score,
        config.char_iou_threshold,
        config.min_char_height_ratio,
      ),
      recognizer: CharRecognizer::new(self.recognizer, config.placeholder, config.charset.clone()),
      assembler: PlateAssembler::new(config.order_tolerance, Draw::new(self.font)),
      device: self.device,
      config,
    })
  }
}

impl<D, S, R> Pipeline<D, S, R> {
  pub fn builder(detector: D, segmenter: S, recognizer: R) -> PipelineBuilder<D, S, R> {
    PipelineBuilder::new(detector, segmenter, recognizer)
  }

  pub fn device(&self) -> &Device {
    &self.device
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }
}

impl<D, S, R> Pipeline<D, S, R>
where
  D: PlateModel,
  D::Error: std::error::Error + Send + Sync + 'static,
  S: SegmentModel,
  S::Error: std::error::Error + Send + Sync + 'static,
  R: CharModel,
  R::Error: std::fmt::Display,
{
  /// 处理一张上传的图像
  ///
  /// 只有图像无法解码时返回错误；空序列表示未发现车牌。
  pub fn process(&self, image_bytes: &[u8]) -> Result<Vec<PlateResult>, DecodeError> {
    let now = Instant::now();
    let image = decode_image(image_bytes)?;
    info!("图像解码完成: {}x{}", image.width(), image.height());

    let results = self.process_image(&image);
    info!(
      "处理完成，发现 {} 个车牌，耗时: {:.2?}",
      results.len(),
      now.elapsed()
    );

    Ok(results)
  }

  /// 处理已解码的图像，结果按车牌检测置信度降序排列
  pub fn process_image(&self, image: &RgbImage) -> Vec<PlateResult> {
    let plates = match self.detector.detect_plates(image) {
      Ok(plates) => plates,
      Err(e) => {
        warn!("车牌检测失败，按无车牌处理: {}", e);
        return Vec::new();
      }
    };

    plates
      .iter()
      .enumerate()
      .filter_map(|(index, plate)| {
        match self
          .assembler
          .assemble(image, plate, &self.segmenter, &self.recognizer)
        {
          Ok(result) => {
            info!(
              "车牌 {}: '{}' 置信度 {:.3}",
              index, result.final_text, result.confidence
            );
            Some(result)
          }
          Err(e) => {
            warn!("跳过车牌 {} ({:?}): {}", index, plate.bbox, e);
            None
          }
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    geometry::BoundingBox,
    model::{CharClass, Detection, Model},
  };

  struct Plates(Vec<Detection>);

  impl Model for Plates {
    type Input = RgbImage;
    type Output = Vec<Detection>;
    type Error = std::io::Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct AlwaysA;

  impl Model for AlwaysA {
    type Input = RgbImage;
    type Output = CharClass;
    type Error = std::io::Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(CharClass {
        label: 'A',
        score: 1.0,
      })
    }
  }

  #[test]
  fn test_builder_rejects_invalid_config() {
    let config = PipelineConfig {
      plate_iou_threshold: 2.0,
      ..Default::default()
    };

    let result = Pipeline::builder(Plates(vec![]), Plates(vec![]), AlwaysA)
      .config(config)
      .build();
    assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
  }

  #[test]
  fn test_builder_carries_device() {
    let pipeline = Pipeline::builder(Plates(vec![]), Plates(vec![]), AlwaysA)
      .device(Device::Npu(0))
      .build()
      .unwrap();
    assert_eq!(pipeline.device(), &Device::Npu(0));
    assert_eq!(pipeline.config(), &PipelineConfig::default());
  }

  #[test]
  fn test_every_plate_is_assembled_in_score_order() {
    // 模型按置信度升序输出
    let plates = Plates(vec![
      Detection::new(BoundingBox::new(30, 0, 20, 10), 0.8),
      Detection::new(BoundingBox::new(0, 0, 20, 10), 0.9),
    ]);
    let chars = Plates(vec![Detection::new(BoundingBox::new(0, 0, 10, 10), 0.9)]);
    let pipeline = Pipeline::builder(plates, chars, AlwaysA).build().unwrap();

    let results = pipeline.process_image(&RgbImage::new(60, 10));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].plate_box.x, 0);
    assert_eq!(results[0].plate_score, 0.9);
    assert_eq!(results[1].plate_box.x, 30);
    assert_eq!(results[1].plate_score, 0.8);
    assert!(results.iter().all(|r| r.final_text == "A"));
  }
}
