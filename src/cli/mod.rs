use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::analysis::{AnalysisProvider, ClaudeProvider};
use crate::engine::{Engine, EngineOptions};
use crate::snapshots::SnapshotStore;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "mlitwatch",
    version,
    about = "物流効率化法サイトの更新を監視し、変更をClaude APIで解析してレポートを生成する"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// 監視を1回実行する（取得→比較→保存→解析→レポート→通知）
    Run(RunArgs),
    /// 最新スナップショットの情報を表示する
    Status(StatusArgs),
    /// スナップショット履歴を表示する
    History(HistoryArgs),
    /// 実効設定を表示する
    Config(ConfigArgs),
    /// シェル補完スクリプトを出力する
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// 監視対象URLを一時的に上書きする
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::effective_home_dir().map_err(crate::exit::invalid_args_err)?;

    let env_config_path = std::env::var_os("MLITWATCH_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => {
            if let Some(url) = args.url {
                cfg.monitor.url = url;
            }

            let timeout = Duration::from_secs(cli.timeout);
            let api_key = std::env::var("CLAUDE_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            let provider: Option<Box<dyn AnalysisProvider>> = match api_key {
                Some(key) => Some(Box::new(ClaudeProvider::new(
                    key,
                    cfg.analysis.model.clone(),
                    cfg.analysis.max_tokens,
                    timeout,
                )?)),
                None => None,
            };
            let webhook_url = if cfg.notify.enabled {
                std::env::var("SLACK_WEBHOOK_URL")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            } else {
                None
            };

            let engine = Engine::new(
                &cfg,
                provider,
                webhook_url,
                EngineOptions {
                    timeout,
                    dry_run: cli.dry_run,
                    show_progress: stderr_is_tty && !cli.quiet && !cli.json,
                },
            )?;

            let report = engine.run()?;
            if cli.json {
                write_json(&report)?;
            } else {
                crate::ui::print_run(&report, &ui_cfg);
            }
        }
        Commands::Status(_args) => {
            let store = SnapshotStore::open(&cfg.storage.snapshot_dir)
                .map_err(crate::exit::store_failed_err)?;
            let meta = store.list().map_err(crate::exit::store_failed_err)?.pop();
            if cli.json {
                write_json(&meta)?;
            } else {
                crate::ui::print_status(meta.as_ref(), &ui_cfg);
            }
        }
        Commands::History(args) => {
            if args.limit == 0 {
                return Err(crate::exit::invalid_args(
                    "history: --limit は 0 より大きい必要があります",
                ));
            }
            let store = SnapshotStore::open(&cfg.storage.snapshot_dir)
                .map_err(crate::exit::store_failed_err)?;
            let mut metas = store.list().map_err(crate::exit::store_failed_err)?;
            if metas.len() > args.limit {
                metas.drain(..metas.len() - args.limit);
            }
            if cli.json {
                write_json(&metas)?;
            } else {
                crate::ui::print_history(&metas, &ui_cfg);
            }
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    let stdout = std::io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: `mlitwatch config --show` を使用してください");
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "mlitwatch", &mut out);
        }
    }

    Ok(())
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "未対応のシェルです: {other}（bash|zsh|fish を指定してください）"
        ))),
    }
}
