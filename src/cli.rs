use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use book_downloader::common::api::client::DEFAULT_SERVER;
use book_downloader::common::utils::parse_chapter_list;
use book_downloader::{BatchOperation, DownloadFormat};

/// 逗号分隔的章节列表
#[derive(Debug, Clone, PartialEq)]
pub struct Chapters(pub Vec<u32>);

fn parse_chapters(input: &str) -> Result<Chapters, String> {
    parse_chapter_list(input).map(Chapters)
}

/// 小说下载任务客户端
#[derive(Parser, Debug)]
#[command(name = "bookdl")]
#[command(version = "1.0")]
#[command(author = "rpeng252@gmail.com")]
#[command(about = "在小说下载服务上创建任务、查看进度、批量管理和重试失败章节", long_about = None)]
pub struct Cli {
    /// 下载服务地址
    #[arg(long, global = true, value_name = "URL", default_value = DEFAULT_SERVER)]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub server: String,

    /// 配置保存目录
    #[arg(long, global = true, value_name = "DIR", default_value = ".bookdl")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// 状态轮询间隔（秒）
    #[arg(long, global = true, value_name = "SECS", default_value_t = 2)]
    pub interval: u64,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 创建下载任务
    Start(StartArgs),

    /// 查看任务状态
    Status {
        task_id: String,
    },

    /// 列出服务端所有任务
    List,

    /// 停止任务
    Stop {
        task_id: String,
    },

    /// 重试失败章节
    Retry {
        task_id: String,

        /// 要重试的章节，不指定时重试全部失败章节
        #[arg(long, value_name = "CHAPTERS")]
        #[arg(value_parser = parse_chapters)]
        #[arg(help = "指定要重试的章节，如: 1-3,5,7-9")]
        chapters: Option<Chapters>,
    },

    /// 批量操作
    Batch {
        #[arg(value_parser = clap::value_parser!(BatchOperation))]
        #[arg(help = "操作: start / stop / pause / resume / delete")]
        operation: BatchOperation,

        #[arg(required = true, num_args = 1..)]
        task_ids: Vec<String>,
    },

    /// 实时显示进行中任务的进度
    Watch,

    /// 查看或修改下载配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 检查下载服务是否可用
    Health,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// 小说目录页地址
    #[arg(long, value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub url: String,

    /// 书名
    #[arg(long, value_name = "NAME")]
    pub name: String,

    /// 起始章节，默认使用配置
    #[arg(long, value_name = "N")]
    pub start: Option<u32>,

    /// 结束章节，默认使用配置
    #[arg(long, value_name = "N")]
    pub end: Option<u32>,

    /// 输出格式: txt / epub
    #[arg(long, value_name = "FORMAT")]
    #[arg(value_parser = clap::value_parser!(DownloadFormat))]
    pub format: Option<DownloadFormat>,

    /// 创建后等待任务结束并显示进度
    #[arg(long)]
    pub watch: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// 显示当前配置
    Show,

    /// 修改配置，只修改给出的项
    Set {
        #[arg(long, value_name = "DIR")]
        output_path: Option<String>,

        #[arg(long, value_parser = clap::value_parser!(DownloadFormat))]
        format: Option<DownloadFormat>,

        #[arg(long)]
        start_chapter: Option<u32>,

        #[arg(long)]
        end_chapter: Option<u32>,

        /// 文件名模板，{book_name} 会被替换为书名
        #[arg(long)]
        file_name: Option<String>,

        #[arg(long)]
        overwrite_existing: Option<bool>,

        #[arg(long)]
        auto_retry: Option<bool>,
    },

    /// 恢复默认配置
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn retry_chapters_are_parsed() {
        let cli = Cli::parse_from(["bookdl", "retry", "t-1", "--chapters", "4,7-8"]);
        match cli.command {
            Command::Retry { task_id, chapters } => {
                assert_eq!(task_id, "t-1");
                assert_eq!(chapters, Some(Chapters(vec![4, 7, 8])));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn batch_takes_operation_and_ids() {
        let cli = Cli::parse_from(["bookdl", "--interval", "1", "batch", "pause", "a", "b"]);
        assert_eq!(cli.interval, 1);
        match cli.command {
            Command::Batch { operation, task_ids } => {
                assert_eq!(operation, BatchOperation::Pause);
                assert_eq!(task_ids, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
