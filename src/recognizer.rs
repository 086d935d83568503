// 该文件是 Paizhao （牌照） 项目的一部分。
// src/recognizer.rs - 字符识别适配器
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
use tracing::warn;

use crate::{
  geometry::BoundingBox,
  model::{CharClass, CharModel, CharacterPrediction, normalize_score},
};

/// 字符识别器
///
/// 识别器是闭集分类器，总会给出一个标签。模型出错、分数无效或标签不在
/// 字符集内时，返回置信度为 0 的占位字符。
pub struct CharRecognizer<M> {
  model: M,
  placeholder: char,
  charset: Option<String>,
}

impl<M> CharRecognizer<M> {
  pub fn new(model: M, placeholder: char, charset: Option<String>) -> Self {
    Self {
      model,
      placeholder,
      charset,
    }
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn placeholder(&self) -> char {
    self.placeholder
  }

  pub(crate) fn placeholder_at(&self, bbox: BoundingBox) -> CharacterPrediction {
    CharacterPrediction {
      bbox,
      label: self.placeholder,
      score: 0.0,
    }
  }
}

impl<M> CharRecognizer<M>
where
  M: CharModel,
  M::Error: std::fmt::Display,
{
  pub fn recognize(&self, character: &RgbImage, bbox: BoundingBox) -> CharacterPrediction {
    let CharClass { label, score } = match self.model.infer(character) {
      Ok(class) => class,
      Err(e) => {
        warn!("字符识别失败，使用占位符 '{}': {}", self.placeholder, e);
        return self.placeholder_at(bbox);
      }
    };

    let Some(score) = normalize_score(score) else {
      warn!("字符 '{}' 的置信度无效，使用占位符", label);
      return self.placeholder_at(bbox);
    };

    if let Some(charset) = &self.charset
      && !charset.contains(label)
    {
      warn!("字符 '{}' 不在字符集内，使用占位符", label);
      return self.placeholder_at(bbox);
    }

    CharacterPrediction { bbox, label, score }
  }
}
