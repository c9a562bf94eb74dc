//! ai-facade CLI — 向任一后端发送一次生成请求的命令行工具
//!
//! Usage:
//!   ai-facade-cli <provider> <prompt> [--system S] [--image PATH|URL] [--stream]

use ai_facade::{AiClient, GenerateRequest, Provider};
use anyhow::{bail, Context};
use futures::StreamExt;
use std::io::Write;
use tracing_subscriber::EnvFilter;

struct CliArgs {
    provider: Provider,
    prompt: String,
    system: Option<String>,
    image: Option<String>,
    stream: bool,
}

fn print_usage() {
    println!(
        r#"ai-facade-cli — 统一大模型门面命令行工具

USAGE:
    ai-facade-cli <PROVIDER> <PROMPT> [OPTIONS]

PROVIDERS:
    openai, deepseek, gemini (google), tgi (selfhosted), ollama, huggingface (hf)

OPTIONS:
    --system <S>          System prompt
    --image <PATH|URL>    Attach one image (local file or http(s) URL)
    --stream              Print text incrementally
    -h, --help            Show this help message

ENVIRONMENT:
    AI_FACADE_CONFIG      YAML file with per-provider defaults
    RUST_LOG              Log filter (e.g. ai_facade=debug)"#
    );
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut positional = Vec::new();
    let mut system = None;
    let mut image = None;
    let mut stream = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--system" => system = Some(iter.next().context("--system needs a value")?.clone()),
            "--image" => image = Some(iter.next().context("--image needs a value")?.clone()),
            "--stream" => stream = true,
            flag if flag.starts_with("--") => bail!("Unknown option: {flag}"),
            _ => positional.push(arg.clone()),
        }
    }

    let [provider, prompt] = positional.as_slice() else {
        bail!("expected <provider> <prompt>, got {} positional arguments", positional.len());
    };
    Ok(CliArgs {
        provider: Provider::from_tag(provider)?,
        prompt: prompt.clone(),
        system,
        image,
        stream,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }
    let cli = parse_args(&args)?;

    let mut request = GenerateRequest::new(cli.prompt);
    if let Some(system) = cli.system {
        request = request.system(system);
    }
    if let Some(image) = cli.image {
        request = request.image(image);
    }

    let client = AiClient::new().await?;
    if cli.stream {
        let mut stream = client.stream(cli.provider, &request).await?;
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            write!(stdout, "{}", chunk?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let response = client.generate(cli.provider, &request).await?;
        println!("{}", response.text);
        if let Some(calls) = response.function_calls {
            for call in calls {
                println!("function_call: {}({})", call.name, call.arguments);
            }
        }
        if let Some(usage) = response.usage {
            eprintln!(
                "tokens: prompt={} completion={} total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0)
            );
        }
    }
    Ok(())
}
