use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing::debug;

use book_downloader::common::logger::PrettyLogger;
use book_downloader::common::storage::FileStore;
use book_downloader::common::utils::FormatTool;
use book_downloader::downloader::progress::ProgressBoard;
use book_downloader::{
    BookClient, ConfigPatch, ConfigStore, DownloadManager, DownloadTask, NewDownload,
    RemoteService,
};
use book_downloader::{log_error, log_info, log_step, log_success, log_warning};

use cli::{Cli, Command, ConfigAction};

mod cli;

/// 等待任务结束，期间显示进度条
async fn watch_until_idle(manager: &DownloadManager) {
    let mut board = ProgressBoard::new();
    let mut changes = manager.subscribe();

    loop {
        board.render(&manager.tasks());
        if manager.active_tasks().is_empty() {
            break;
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log_warning!("已中断，服务端任务仍在继续");
                break;
            }
        }
    }

    PrettyLogger::stats_summary(&manager.stats());
}

fn show_config(config: &ConfigStore) {
    let config = config.get();
    PrettyLogger::separator();
    PrettyLogger::field("输出目录", &config.output_path);
    PrettyLogger::field("格式", config.format.as_str());
    PrettyLogger::field(
        "章节范围",
        format!("{}-{}", config.start_chapter, config.end_chapter),
    );
    PrettyLogger::field("文件名", &config.file_name);
    PrettyLogger::field("覆盖已有", config.overwrite_existing.to_string());
    PrettyLogger::field("自动重试", config.auto_retry.to_string());
    PrettyLogger::separator();
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let client = BookClient::new(&args.server).context("无法创建 HTTP 客户端")?;
    let store = Arc::new(FileStore::new(&args.data_dir));
    let config = Arc::new(ConfigStore::load(store));
    let interval = Duration::from_secs(args.interval.max(1));
    let manager = DownloadManager::with_interval(Arc::new(client.clone()), config.clone(), interval);
    debug!("服务地址: {}, 配置目录: {}", client.base_url(), args.data_dir.display());

    match args.command {
        Command::Health => {
            let health = client.health().await.context("无法连接下载服务")?;
            if health.is_healthy() {
                log_success!("下载服务正常: {}", health.message);
            } else {
                log_warning!("下载服务状态: {} {}", health.status, health.message);
            }
        }

        Command::Start(start) => {
            let new = NewDownload {
                source_url: start.url,
                book_name: start.name,
                start_chapter: start.start,
                end_chapter: start.end,
                format: start.format,
            };
            let output = config.get().output_file(&new.book_name);
            let task = manager.create_task(new).await?;
            log_success!("下载任务已创建: {}", task.task_id.bold());
            PrettyLogger::field("书名", &task.book_name);
            PrettyLogger::field(
                "章节范围",
                format!("{}-{} (共 {} 章)", task.start_chapter, task.end_chapter, task.total),
            );
            PrettyLogger::field("输出文件", output.display().to_string());

            if start.watch {
                log_step!("等待下载完成");
                watch_until_idle(&manager).await;
            }
        }

        Command::Status { task_id } => {
            let status = client.query_status(&task_id).await?;
            let task = DownloadTask::from_status(status, None);
            PrettyLogger::separator();
            PrettyLogger::task_detail(&task);
            PrettyLogger::separator();
        }

        Command::List => {
            manager.sync_tasks().await?;
            let tasks = manager.tasks();
            if tasks.is_empty() {
                log_info!("暂无下载任务");
            } else {
                PrettyLogger::separator();
                for task in &tasks {
                    PrettyLogger::task_line(task);
                }
                PrettyLogger::separator();
            }
            PrettyLogger::stats_summary(&manager.stats());
        }

        Command::Stop { task_id } => {
            manager.sync_tasks().await?;
            let task = manager.stop_task(&task_id).await?;
            log_success!("已停止: {} ({}/{})", task.book_name, task.current, task.total);
        }

        Command::Retry { task_id, chapters } => {
            manager.sync_tasks().await?;
            let submitted = manager
                .retry_failed(&task_id, chapters.map(|c| c.0))
                .await?;
            log_success!(
                "已提交 {} 个章节重试: {}",
                submitted.len(),
                FormatTool::format_chapters(&submitted)
            );
        }

        Command::Batch {
            operation,
            task_ids,
        } => {
            manager.sync_tasks().await?;
            let report = manager.batch(operation, &task_ids).await?;
            log_success!("批量{}完成: {} 个任务", operation, report.applied.len());
            if !report.skipped.is_empty() {
                log_warning!("本地没有这些任务: {}", report.skipped.join(", "));
            }
        }

        Command::Watch => {
            manager.sync_tasks().await?;
            if manager.active_tasks().is_empty() {
                log_info!("没有进行中的任务");
                PrettyLogger::stats_summary(&manager.stats());
            } else {
                watch_until_idle(&manager).await;
            }
        }

        Command::Config { action } => match action {
            ConfigAction::Show => show_config(&config),
            ConfigAction::Set {
                output_path,
                format,
                start_chapter,
                end_chapter,
                file_name,
                overwrite_existing,
                auto_retry,
            } => {
                config.update(ConfigPatch {
                    output_path,
                    format,
                    start_chapter,
                    end_chapter,
                    file_name,
                    overwrite_existing,
                    auto_retry,
                })?;
                log_success!("配置已保存");
                show_config(&config);
            }
            ConfigAction::Reset => {
                config.reset()?;
                log_success!("已恢复默认配置");
                show_config(&config);
            }
        },
    }

    manager.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // 初始化日志
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    debug!("bookdl 启动");
    if let Err(e) = run(args).await {
        log_error!("{:#}", e);
        std::process::exit(1);
    }
}
