//! 小说下载任务客户端
//!
//! 在远程下载服务上创建任务、轮询进度、批量启停与重试失败章节。
//! 界面层只需要使用 [`DownloadManager`]。

pub mod common;
pub mod config;
pub mod downloader;

pub use common::api::client::BookClient;
pub use common::api::error::ApiError;
pub use common::api::service::RemoteService;
pub use common::models::{BatchOperation, DownloadFormat, TaskStatus};
pub use config::{ConfigPatch, ConfigStore, DownloadConfig};
pub use downloader::{DownloadError, DownloadManager, DownloadTask, NewDownload};
