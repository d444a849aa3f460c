use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use arxiv_digest::pipeline::DEFAULT_MAX_PAPERS;

/// arXiv 论文自动总结工具
#[derive(Parser, Debug)]
#[command(name = "arxivd")]
#[command(version = "0.1")]
#[command(about = "搜索 arXiv 论文、下载 PDF、生成 AI 总结并发送邮件", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// PDF 与总结的保存目录 (覆盖 DATA_DIR)
    #[arg(long, value_name = "DIR", global = true)]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// 同时下载的论文数 (覆盖 DOWNLOAD_CONCURRENCY)
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 立即执行一次：搜索、下载、总结并发送邮件
    Run {
        #[command(flatten)]
        topic: TopicArgs,

        /// 接收总结的邮箱地址
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },

    /// 定时任务模式，每天在 SCHEDULED_TIME 执行
    Schedule {
        /// 启动时先立即执行一次
        #[arg(long)]
        now: bool,
    },

    /// 只搜索论文并打印结果
    Search {
        /// 搜索主题
        #[arg(long, value_name = "TOPIC")]
        #[arg(required_unless_present_any = ["category", "author"])]
        topic: Option<String>,

        /// 按分类搜索，如 cs.AI
        #[arg(long, value_name = "CATEGORY", conflicts_with_all = ["topic", "author"])]
        category: Option<String>,

        /// 按作者搜索
        #[arg(long, value_name = "NAME", conflicts_with = "topic")]
        author: Option<String>,

        #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PAPERS)]
        max: usize,

        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 搜索并下载 PDF，不生成总结
    Download {
        #[command(flatten)]
        topic: TopicArgs,
    },

    /// 删除数据目录中无效的 PDF 和残留的临时文件
    Cleanup,

    /// 列出已下载的 PDF
    List,
}

#[derive(Args, Debug)]
pub struct TopicArgs {
    /// 搜索主题
    #[arg(long, value_name = "TOPIC")]
    pub topic: String,

    /// 最大论文数量 (1-20)
    #[arg(long, visible_alias = "max", value_name = "N")]
    #[arg(default_value_t = DEFAULT_MAX_PAPERS)]
    pub max_papers: usize,
}
