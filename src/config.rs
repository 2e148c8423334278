use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::models::DownloadFormat;
use crate::common::storage::{KeyValueStore, StorageError};

/// 配置在键值存储中的记录名
pub const CONFIG_KEY: &str = "download_config";

/// 用户的下载偏好
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadConfig {
    pub output_path: String,
    pub format: DownloadFormat,
    pub start_chapter: u32,
    pub end_chapter: u32,
    // 文件名模板，{book_name} 会被替换为书名
    pub file_name: String,
    pub overwrite_existing: bool,
    pub auto_retry: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_path: "./downloads".to_string(),
            format: DownloadFormat::Txt,
            start_chapter: 1,
            end_chapter: 100,
            file_name: "{book_name}".to_string(),
            overwrite_existing: false,
            auto_retry: true,
        }
    }
}

impl DownloadConfig {
    /// 按模板生成输出文件路径
    pub fn output_file(&self, book_name: &str) -> PathBuf {
        let stem = self.file_name.replace("{book_name}", book_name);
        PathBuf::from(&self.output_path).join(format!("{}.{}", stem, self.format))
    }
}

/// 配置的部分更新，只覆盖给出的字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub output_path: Option<String>,
    pub format: Option<DownloadFormat>,
    pub start_chapter: Option<u32>,
    pub end_chapter: Option<u32>,
    pub file_name: Option<String>,
    pub overwrite_existing: Option<bool>,
    pub auto_retry: Option<bool>,
}

impl ConfigPatch {
    fn apply(self, config: &mut DownloadConfig) {
        if let Some(v) = self.output_path {
            config.output_path = v;
        }
        if let Some(v) = self.format {
            config.format = v;
        }
        if let Some(v) = self.start_chapter {
            config.start_chapter = v;
        }
        if let Some(v) = self.end_chapter {
            config.end_chapter = v;
        }
        if let Some(v) = self.file_name {
            config.file_name = v;
        }
        if let Some(v) = self.overwrite_existing {
            config.overwrite_existing = v;
        }
        if let Some(v) = self.auto_retry {
            config.auto_retry = v;
        }
    }
}

pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
    config: RwLock<DownloadConfig>,
}

impl ConfigStore {
    /// 从存储中读取配置，没有记录或记录损坏时使用默认值
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let config = match store.get(CONFIG_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("配置记录无法解析，使用默认配置: {}", e);
                DownloadConfig::default()
            }),
            Ok(None) => DownloadConfig::default(),
            Err(e) => {
                warn!("读取配置失败，使用默认配置: {}", e);
                DownloadConfig::default()
            }
        };

        Self {
            store,
            config: RwLock::new(config),
        }
    }

    pub fn get(&self) -> DownloadConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 合并并保存配置；保存失败时内存中的配置保持不变
    pub fn update(&self, patch: ConfigPatch) -> Result<DownloadConfig, StorageError> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = config.clone();
        patch.apply(&mut next);
        self.persist(&next)?;
        *config = next.clone();
        Ok(next)
    }

    pub fn reset(&self) -> Result<DownloadConfig, StorageError> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let defaults = DownloadConfig::default();
        self.persist(&defaults)?;
        *config = defaults.clone();
        Ok(defaults)
    }

    fn persist(&self, config: &DownloadConfig) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(config)?;
        self.store.set(CONFIG_KEY, &raw)?;
        debug!("配置已保存");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::storage::MemoryStore;

    #[test]
    fn missing_record_yields_defaults() {
        let store = ConfigStore::load(Arc::new(MemoryStore::new()));
        assert_eq!(store.get(), DownloadConfig::default());
    }

    #[test]
    fn update_merges_and_persists_full_config() {
        let backend = Arc::new(MemoryStore::new());
        let store = ConfigStore::load(backend.clone());

        let updated = store
            .update(ConfigPatch {
                format: Some(DownloadFormat::Epub),
                end_chapter: Some(50),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.format, DownloadFormat::Epub);
        assert_eq!(updated.end_chapter, 50);
        assert_eq!(updated.output_path, "./downloads");

        let raw = backend.get(CONFIG_KEY).unwrap().unwrap();
        let persisted: DownloadConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, updated);

        // 重新加载得到相同的配置
        let reloaded = ConfigStore::load(backend);
        assert_eq!(reloaded.get(), updated);
    }

    #[test]
    fn reset_restores_and_persists_defaults() {
        let backend = Arc::new(MemoryStore::new());
        let store = ConfigStore::load(backend.clone());
        store
            .update(ConfigPatch {
                auto_retry: Some(false),
                ..Default::default()
            })
            .unwrap();

        let config = store.reset().unwrap();
        assert_eq!(config, DownloadConfig::default());
        let raw = backend.get(CONFIG_KEY).unwrap().unwrap();
        assert_eq!(
            serde_json::from_str::<DownloadConfig>(&raw).unwrap(),
            DownloadConfig::default()
        );
    }

    #[test]
    fn partial_and_corrupt_records_fall_back_to_defaults() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(CONFIG_KEY, r#"{"outputPath": "/data/books"}"#)
            .unwrap();
        let config = ConfigStore::load(backend.clone()).get();
        assert_eq!(config.output_path, "/data/books");
        assert_eq!(config.format, DownloadFormat::Txt);

        backend.set(CONFIG_KEY, "not json").unwrap();
        assert_eq!(ConfigStore::load(backend).get(), DownloadConfig::default());
    }

    // 写入总是失败的存储
    struct FullDisk;

    impl KeyValueStore for FullDisk {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk full").into())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn failed_save_leaves_config_unchanged() {
        let store = ConfigStore::load(Arc::new(FullDisk));

        let err = store
            .update(ConfigPatch {
                end_chapter: Some(7),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(store.get(), DownloadConfig::default());
    }

    #[test]
    fn failed_reset_keeps_current_config() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(CONFIG_KEY, r#"{"endChapter": 30}"#).unwrap();
        let loaded = ConfigStore::load(backend);
        // 换成写不进去的存储
        let store = ConfigStore {
            store: Arc::new(FullDisk),
            config: RwLock::new(loaded.get()),
        };

        assert!(store.reset().is_err());
        assert_eq!(store.get().end_chapter, 30);
    }

    #[test]
    fn output_file_uses_template_and_format() {
        let config = DownloadConfig {
            file_name: "{book_name}-全本".to_string(),
            format: DownloadFormat::Epub,
            ..Default::default()
        };
        assert_eq!(
            config.output_file("斗破苍穹"),
            PathBuf::from("./downloads").join("斗破苍穹-全本.epub")
        );
    }
}
