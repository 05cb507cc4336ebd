//! Chat command - one streamed completion against a configured provider

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use base64::Engine as _;
use clap::Args;
use futures::StreamExt;
use tracing::info;

use crate::domain::llm::{Citation, FileContent, GeneratedImage};
use crate::domain::{Chunk, ContentPart, ErrorCode, Message, ReasoningEffort, RequestConfig};
use crate::infrastructure::services::CompletionsParams;

/// Arguments for the chat command
#[derive(Args, Clone, Debug)]
pub struct ChatArgs {
    /// Provider id from the config file
    #[arg(long, short)]
    pub provider: String,

    /// Model id as the provider names it
    #[arg(long, short)]
    pub model: String,

    /// User message
    pub prompt: String,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// none, minimal, low, medium, high or auto
    #[arg(long)]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Attach an image (repeatable)
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,

    /// Attach a text or PDF file (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    #[arg(long)]
    pub web_search: bool,

    #[arg(long)]
    pub generate_image: bool,

    /// Request a single non-streamed response
    #[arg(long)]
    pub no_stream: bool,

    /// Print every chunk as a JSON line
    #[arg(long)]
    pub json: bool,
}

/// Run the chat command. Ctrl-C aborts the request and keeps the partial answer.
pub async fn run(args: ChatArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();

    let entry = config.provider(&args.provider)?;
    let provider = entry.to_provider();
    let model = entry.model(&args.model);
    let engine = Arc::new(super::provider_factory(&config)?.create_engine(provider, &model)?);

    let message = build_message(&args).await?;
    let message_id = message.id.clone();
    let params = CompletionsParams::new(model, vec![message]).with_config(request_config(&args));

    info!(provider = %args.provider, model = %args.model, "Sending chat request");
    let mut stream = engine.completions_stream(params);

    let abort_engine = Arc::clone(&engine);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort_engine.abort(&message_id);
        }
    });

    let mut printer = Printer::new(args.json);
    let mut failure = None;
    while let Some(chunk) = stream.next().await {
        if let Chunk::Error { message, code } = &chunk {
            if *code != ErrorCode::Aborted {
                failure = Some(format!("{} ({})", message, code.as_str()));
            }
        }
        printer.print(&chunk)?;
    }
    ctrl_c.abort();

    match failure {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn request_config(args: &ChatArgs) -> RequestConfig {
    let mut builder = RequestConfig::builder()
        .stream_output(!args.no_stream)
        .enable_web_search(args.web_search)
        .enable_generate_image(args.generate_image);

    if let Some(system) = &args.system {
        builder = builder.prompt(system.clone());
    }
    if let Some(temperature) = args.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    if let Some(effort) = args.reasoning_effort {
        builder = builder.reasoning_effort(effort);
    }
    builder.build()
}

async fn build_message(args: &ChatArgs) -> anyhow::Result<Message> {
    let mut parts = vec![ContentPart::text(args.prompt.clone())];

    for path in &args.images {
        parts.push(image_part(path).await?);
    }
    for path in &args.files {
        parts.push(file_part(path).await?);
    }

    Ok(Message::user_with_parts(parts))
}

fn media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn image_part(path: &Path) -> anyhow::Result<ContentPart> {
    let media_type = media_type(path);
    if !media_type.starts_with("image/") {
        bail!("{} is not an image ({})", path.display(), media_type);
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(ContentPart::ImageBase64 {
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        media_type,
    })
}

async fn file_part(path: &Path) -> anyhow::Result<ContentPart> {
    let media_type = media_type(path);
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let content = if media_type == "application/pdf" {
        FileContent::Base64 {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    } else {
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is neither PDF nor UTF-8 text", path.display()))?;
        FileContent::Text { text }
    };

    Ok(ContentPart::File {
        name: file_name(path),
        media_type,
        content,
    })
}

/// Renders chunks: answer text on stdout, everything else on stderr
struct Printer {
    json: bool,
    in_thinking: bool,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            json,
            in_thinking: false,
        }
    }

    fn print(&mut self, chunk: &Chunk) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(chunk)?);
            return Ok(());
        }

        let mut out = std::io::stdout();
        match chunk {
            Chunk::TextDelta { text } => {
                self.end_thinking();
                write!(out, "{}", text)?;
                out.flush()?;
            }
            Chunk::ThinkingDelta { text, .. } => {
                if !self.in_thinking {
                    eprint!("[thinking] ");
                    self.in_thinking = true;
                }
                eprint!("{}", text);
            }
            Chunk::ThinkingComplete { elapsed_ms, .. } => {
                self.end_thinking();
                eprintln!("[thought for {} ms]", elapsed_ms);
            }
            Chunk::ToolCallPending { calls } => {
                for call in calls {
                    eprintln!("[tool] {} {}", call.tool.name, call.arguments.to_json_string());
                }
            }
            Chunk::ToolCallComplete { results } => {
                for result in results {
                    eprintln!("[tool] {} -> {:?}", result.tool.name, result.status);
                }
            }
            Chunk::WebSearchComplete { results, .. } => print_citations(results),
            Chunk::ImageComplete { images } => print_images(images),
            Chunk::BlockComplete { usage, metrics, .. } => {
                println!();
                eprintln!(
                    "[done] {} prompt + {} completion tokens, first token {} ms, total {} ms",
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    metrics.time_to_first_token_ms,
                    metrics.time_to_completion_ms
                );
            }
            Chunk::Error { message, code } => {
                println!();
                if *code == ErrorCode::Aborted {
                    eprintln!("[aborted]");
                } else {
                    eprintln!("[error] {}", message);
                }
            }
            Chunk::ResponseCreated | Chunk::TextComplete { .. } | Chunk::ImageCreated => {}
        }
        Ok(())
    }

    fn end_thinking(&mut self) {
        if self.in_thinking {
            eprintln!();
            self.in_thinking = false;
        }
    }
}

fn print_citations(results: &[Citation]) {
    for (index, citation) in results.iter().enumerate() {
        match &citation.title {
            Some(title) => eprintln!("[{}] {} - {}", index + 1, title, citation.url),
            None => eprintln!("[{}] {}", index + 1, citation.url),
        }
    }
}

fn print_images(images: &[GeneratedImage]) {
    for image in images {
        match image {
            GeneratedImage::Url { url } => eprintln!("[image] {}", url),
            GeneratedImage::Base64 { media_type, data } => {
                eprintln!("[image] {} ({} bytes base64)", media_type, data.len())
            }
        }
    }
}
