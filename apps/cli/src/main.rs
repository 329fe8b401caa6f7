use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chatlink_core_sdk::conversation::{Conversation, SubmitError, GREETING};
use chatlink_core_sdk::graphql::GraphqlTransport;
use chatlink_core_sdk::prelude::*;
use chatlink_core_sdk::{proxy, telemetry};

/**
 * \brief CLI 程序入口：终端版聊天界面与边缘代理。
 */
#[derive(Parser, Debug)]
#[command(name = "chatlink", version, about = "ChatLink terminal chat client")]
struct Cli {
    /** \brief 输出 debug 日志 */
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    /** \brief 日志写入文件而非 stderr */
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 发送一条消息并打印回复。
     */
    Send {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "graphql")]
        transport: TransportMode,
        /** \brief 覆盖构建期端点，直接指定后端基地址 */
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },

    /**
     * \brief 交互式会话。
     */
    Chat {
        #[arg(long, default_value = "graphql")]
        transport: TransportMode,
        #[arg(long)]
        base_url: Option<String>,
    },

    /**
     * \brief GraphQL 健康检查。
     */
    Health {
        #[arg(long)]
        base_url: Option<String>,
    },

    /**
     * \brief 查询后端 API 配置。
     */
    Config {
        #[arg(long)]
        base_url: Option<String>,
    },

    /**
     * \brief 启动边缘代理并提供静态前端。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:5173")]
        addr: String,
        /** \brief 上游后端地址，默认读取 CHATLINK_UPSTREAM */
        #[arg(long)]
        upstream: Option<String>,
        #[arg(long)]
        static_dir: Option<String>,
    },
}

fn endpoints(base_url: Option<&str>) -> EndpointConfig {
    match base_url {
        Some(base) => EndpointConfig::from_base(base),
        None => EndpointConfig::from_build(),
    }
}

fn render_error(err: &DispatchError) -> String {
    format!("[{}] {}", err.kind, err.message)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.log_file.as_deref()).context("init logging failed")?;

    match cli.command {
        Commands::Send {
            prompt,
            transport,
            base_url,
            session_id,
            model,
        } => {
            let message = prompt.trim();
            if message.is_empty() {
                bail!("prompt is empty");
            }
            let client = ChatClient::from_config(&endpoints(base_url.as_deref()))
                .context("build http client failed")?;
            let request = DispatchRequest::new(message).with_options(DispatchOptions {
                session_id,
                model,
                ..Default::default()
            });
            match client.dispatch_request(&request, transport).await {
                Ok(reply) => println!("{}", reply.reply),
                Err(e) => bail!(render_error(&e)),
            }
        }
        Commands::Chat {
            transport,
            base_url,
        } => {
            let client = ChatClient::from_config(&endpoints(base_url.as_deref()))
                .context("build http client failed")?;
            run_chat(&client, transport).await?;
        }
        Commands::Health { base_url } => {
            let cfg = endpoints(base_url.as_deref());
            let gql = GraphqlTransport::connect(cfg.graphql_url)
                .map_err(|e| anyhow::anyhow!(render_error(&e)))?;
            let health = gql.health().await.map_err(|e| anyhow::anyhow!(render_error(&e)))?;
            println!(
                "status={} version={} timestamp={}",
                health.status, health.version, health.timestamp
            );
        }
        Commands::Config { base_url } => {
            let cfg = endpoints(base_url.as_deref());
            let gql = GraphqlTransport::connect(cfg.graphql_url)
                .map_err(|e| anyhow::anyhow!(render_error(&e)))?;
            let api = gql
                .api_config()
                .await
                .map_err(|e| anyhow::anyhow!(render_error(&e)))?;
            println!("version={} max_tokens={}", api.version, api.max_tokens);
            for model in api.supported_models {
                println!("  - {}", model);
            }
        }
        Commands::Serve {
            addr,
            upstream,
            static_dir,
        } => {
            let mut config = ProxyConfig::from_env();
            if let Some(upstream) = upstream {
                config.upstream = upstream;
            }
            if let Some(dir) = static_dir {
                config.static_dir = dir;
            }
            proxy::run(&addr, &config).await?;
        }
    }

    Ok(())
}

/**
 * \brief 交互循环。发送中不会读取下一行，失败不会结束会话。
 */
async fn run_chat(client: &ChatClient, initial: TransportMode) -> Result<()> {
    let mut mode = initial;
    let mut conv = Conversation::with_greeting(GREETING);
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}\n", GREETING);
    println!("(transport={}, /mode rest|graphql, /retry, /save PATH, /quit)", mode);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        let outcome = match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/mode", arg) => {
                match arg.parse::<TransportMode>() {
                    Ok(m) => {
                        tracing::debug!(from = %mode, to = %m, "transport switched");
                        mode = m;
                        println!("transport={}", mode);
                    }
                    Err(e) => eprintln!("{}", e),
                }
                continue;
            }
            ("/save", path) if !path.trim().is_empty() => {
                let json = conv.to_json().context("serialize transcript failed")?;
                tokio::fs::write(path.trim(), json)
                    .await
                    .with_context(|| format!("write transcript to {} failed", path.trim()))?;
                println!("saved {} messages", conv.messages().len());
                continue;
            }
            ("/retry", _) => conv.resend(client, mode).await,
            _ => conv.submit(client, input, mode).await,
        };

        match outcome {
            Ok(reply) => println!("\n{}\n", reply.content),
            Err(SubmitError::EmptyInput) => {}
            Err(SubmitError::NothingToResend) => eprintln!("nothing to retry"),
            Err(SubmitError::Dispatch(e)) => {
                eprintln!("{} (type /retry to resend)", render_error(&e));
            }
        }
    }
    Ok(())
}
