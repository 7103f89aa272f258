//! Concierge - 交互式命令行
//!
//! 入口：初始化日志、加载配置、组装编排器，然后逐行读取 stdin。
//! 命令：`/agent <openai|groq>` 切换 Agent，`/new` 开始新对话，`/quit` 退出。

use anyhow::Context;
use concierge::config::load_config_or_default;
use concierge::core::AppBuilder;
use concierge::{observability, AgentKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(std::env::args().nth(1).map(Into::into));
    let orchestrator = AppBuilder::new(cfg)
        .build()
        .context("Failed to build orchestrator")?;

    let mut agent = AgentKind::default();
    let mut conversation_id: Option<String> = None;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Concierge ready. /agent <openai|groq>, /new, /quit\n")
        .await?;
    loop {
        stdout
            .write_all(format!("[{agent}]> ").as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(rest) = input.strip_prefix("/agent") {
            match rest.trim().parse::<AgentKind>() {
                Ok(kind) => {
                    agent = kind;
                    stdout
                        .write_all(format!("switched to {}\n", kind.display_name()).as_bytes())
                        .await?;
                }
                Err(e) => stdout.write_all(format!("{e}\n").as_bytes()).await?,
            }
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/new" => {
                conversation_id = None;
                stdout.write_all(b"started a new conversation\n").await?;
                continue;
            }
            _ => {}
        }

        let outcome = orchestrator
            .process(input, agent, conversation_id.clone())
            .await;
        conversation_id = Some(outcome.conversation_id.clone());

        let text = if outcome.is_success() {
            outcome.response.unwrap_or_default()
        } else {
            format!("error: {}", outcome.message.unwrap_or_default())
        };
        stdout.write_all(format!("{text}\n").as_bytes()).await?;
    }

    Ok(())
}
