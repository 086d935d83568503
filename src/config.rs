// 该文件是 Paizhao （牌照） 项目的一部分。
// src/config.rs - 流水线配置
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
  #[error("未知的配置项: {0}")]
  UnknownKey(String),
  #[error("配置项 {key} 的值无效: {value}")]
  InvalidValue { key: String, value: String },
  #[error("配置项 {key} 超出范围: {value}")]
  OutOfRange { key: &'static str, value: f32 },
  #[error("max_plates 必须大于 0")]
  ZeroPlates,
}

/// 流水线的阈值与策略配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// 车牌检测最低置信度
  pub plate_min_score: f32,
  /// 车牌 NMS IoU 阈值
  pub plate_iou_threshold: f32,
  /// 单幅图像最多处理的车牌数
  pub max_plates: usize,
  /// 字符分割最低置信度
  pub char_min_score: f32,
  /// 字符 NMS IoU 阈值
  pub char_iou_threshold: f32,
  /// 字符框最小高度（相对车牌高度）
  pub min_char_height_ratio: f32,
  /// 从左到右排序时的 x 坐标容差（像素）
  pub order_tolerance: u32,
  /// 识别失败时使用的占位字符
  pub placeholder: char,
  /// 允许的字符集，`None` 表示不限制
  pub charset: Option<String>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      plate_min_score: 0.5,
      plate_iou_threshold: 0.45,
      max_plates: 10,
      char_min_score: 0.3,
      char_iou_threshold: 0.3,
      min_char_height_ratio: 0.2,
      order_tolerance: 2,
      placeholder: '?',
      charset: None,
    }
  }
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    let ratios = [
      ("plate_min_score", self.plate_min_score),
      ("plate_iou_threshold", self.plate_iou_threshold),
      ("char_min_score", self.char_min_score),
      ("char_iou_threshold", self.char_iou_threshold),
      ("min_char_height_ratio", self.min_char_height_ratio),
    ];
    for (key, value) in ratios {
      if !(0.0..=1.0).contains(&value) {
        error!("配置项 {} 超出范围: {}", key, value);
        return Err(ConfigError::OutOfRange { key, value });
      }
    }

    if self.max_plates == 0 {
      return Err(ConfigError::ZeroPlates);
    }

    Ok(())
  }

  fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
      value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
      })
    }

    match key {
      "plate_min_score" => self.plate_min_score = parse(key, value)?,
      "plate_iou_threshold" => self.plate_iou_threshold = parse(key, value)?,
      "max_plates" => self.max_plates = parse(key, value)?,
      "char_min_score" => self.char_min_score = parse(key, value)?,
      "char_iou_threshold" => self.char_iou_threshold = parse(key, value)?,
      "min_char_height_ratio" => self.min_char_height_ratio = parse(key, value)?,
      "order_tolerance" => self.order_tolerance = parse(key, value)?,
      "placeholder" => self.placeholder = parse(key, value)?,
      "charset" => self.charset = Some(value.to_string()),
      _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
  }
}

impl FromUrlWithScheme for PipelineConfig {
  const SCHEME: &'static str = "anpr";
}

/// 从 `anpr://?plate_min_score=0.6&charset=...` 形式的 URL 构造配置，
/// 未出现的配置项取默认值
impl FromUrl for PipelineConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConfigError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let mut config = PipelineConfig::default();
    for (key, value) in url.query_pairs() {
      config.set(&key, &value)?;
    }
    config.validate()?;

    Ok(config)
  }
}
