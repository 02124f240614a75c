use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::media::{
    split_file, DownloadError, FilePart, MediaDownloader, Platform, ToolCapabilities, Workspace,
};
use crate::utils::format_size;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Pause between consecutive part uploads, to stay under rate limits.
const PART_SEND_DELAY: Duration = Duration::from_secs(1);

/// Uploads of a full-size part take a while; the default client timeout
/// would cut them off.
const API_TIMEOUT: Duration = Duration::from_secs(360);

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "show what this bot can do")]
    Start,
    #[command(description = "show detailed usage help")]
    Help,
}

pub async fn run(config: Config) -> Result<()> {
    let token = config.bot_token()?.to_string();

    let capabilities = ToolCapabilities::probe().await;
    let tools = capabilities.available_tools();
    if tools.is_empty() {
        warn!("No external downloaders available, falling back to direct downloads only");
    } else {
        info!("Available downloaders: {}", tools.join(", "));
    }

    let downloader = Arc::new(
        MediaDownloader::new(&config, capabilities)
            .context("Failed to initialize media downloader")?,
    );
    let config = Arc::new(config);

    let client = teloxide::net::default_reqwest_settings()
        .timeout(API_TIMEOUT)
        .build()
        .context("Failed to build Telegram HTTP client")?;
    let bot = Bot::with_client(token, client);

    info!("Telegram bot starting...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Message::filter_text().endpoint(handle_url));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![downloader, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    config: Arc<Config>,
) -> HandlerResult {
    let text = match cmd {
        Command::Start => welcome_text(),
        Command::Help => help_text(&config),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_url(
    bot: Bot,
    msg: Message,
    text: String,
    downloader: Arc<MediaDownloader>,
    config: Arc<Config>,
) -> HandlerResult {
    let url = text.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bot.send_message(
            msg.chat.id,
            "Invalid URL. Please send a valid http(s) link.",
        )
        .await?;
        return Ok(());
    }

    let status = bot
        .send_message(msg.chat.id, "Analyzing URL and selecting download method...")
        .await?;

    if let Err(err) = serve_request(&bot, &msg, &status, &url, &downloader, &config).await {
        error!("Request for {} failed: {:#}", url, err);
        let _ = edit(
            &bot,
            &status,
            "Something went wrong while processing this link. Please try again later.",
        )
        .await;
    }

    Ok(())
}

/// One request end to end: workspace, fallback chain, split, upload. The
/// workspace is removed on every exit path, including the early-return
/// ones, which is why it outlives the whole function body.
async fn serve_request(
    bot: &Bot,
    msg: &Message,
    status: &Message,
    url: &str,
    downloader: &MediaDownloader,
    config: &Config,
) -> Result<()> {
    let workspace =
        Workspace::create(&config.temp_dir).context("Failed to create request workspace")?;

    let outcome = deliver(bot, msg, status, url, downloader, config, &workspace).await;
    workspace.dispose();
    outcome
}

async fn deliver(
    bot: &Bot,
    msg: &Message,
    status: &Message,
    url: &str,
    downloader: &MediaDownloader,
    config: &Config,
    workspace: &Workspace,
) -> Result<()> {
    let platform = Platform::classify(url);
    edit(bot, status, format!("Downloading ({platform} platform)...")).await?;

    let result = downloader.download(url, workspace.path()).await;
    let path = match result.into_output() {
        Ok(path) => path,
        Err(err) => {
            edit(bot, status, describe_failure(&err)).await?;
            return Ok(());
        }
    };

    let size = tokio::fs::metadata(&path)
        .await
        .context("Downloaded file disappeared before delivery")?
        .len();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("video.mp4")
        .to_string();
    info!("Downloaded {} ({})", path.display(), format_size(size));

    if size > config.max_part_size {
        edit(
            bot,
            status,
            format!(
                "File is {}, splitting into {} parts...",
                format_size(size),
                size.div_ceil(config.max_part_size)
            ),
        )
        .await?;
    } else {
        edit(
            bot,
            status,
            format!("Sending {} ({})...", filename, format_size(size)),
        )
        .await?;
    }

    let parts = match split_file(&path, config.max_part_size, config.chunk_size).await {
        Ok(parts) => parts,
        Err(source) => {
            let err = DownloadError::PostProcess {
                path: path.clone(),
                source,
            };
            warn!("{:#}", anyhow::Error::new(err));
            edit(
                bot,
                status,
                "The file was downloaded but could not be prepared for delivery. Please try again.",
            )
            .await?;
            return Ok(());
        }
    };

    send_parts(bot, msg.chat.id, status, &filename, url, &parts).await?;

    edit(
        bot,
        status,
        format!("Done. {} sent, temporary files removed.", filename),
    )
    .await?;
    Ok(())
}

async fn send_parts(
    bot: &Bot,
    chat_id: ChatId,
    status: &Message,
    filename: &str,
    url: &str,
    parts: &[FilePart],
) -> Result<()> {
    if let [single] = parts {
        bot.send_video(chat_id, InputFile::file(single.path.clone()))
            .caption(format!(
                "{}\nSize: {}\nSource: {}",
                filename,
                format_size(single.len),
                url
            ))
            .await?;
        return Ok(());
    }

    for part in parts {
        edit(
            bot,
            status,
            format!(
                "Sending part {}/{} ({})...",
                part.index,
                parts.len(),
                format_size(part.len)
            ),
        )
        .await?;

        let part_name = part
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("part.bin")
            .to_string();

        // Raw byte ranges are not playable on their own, so parts go out as
        // documents the user can reassemble.
        bot.send_document(chat_id, InputFile::file(part.path.clone()).file_name(part_name))
            .caption(format!(
                "{} (part {}/{})\nSource: {}",
                filename,
                part.index,
                parts.len(),
                url
            ))
            .await?;

        if part.index < parts.len() {
            tokio::time::sleep(PART_SEND_DELAY).await;
        }
    }

    Ok(())
}

async fn edit(bot: &Bot, status: &Message, text: impl Into<String>) -> Result<()> {
    bot.edit_message_text(status.chat.id, status.id, text.into())
        .await?;
    Ok(())
}

fn describe_failure(err: &DownloadError) -> String {
    match err {
        DownloadError::Exhausted { attempts, .. } => {
            let mut lines = vec!["Download failed. Every method was tried:".to_string()];
            for attempt in attempts {
                if let Some(diagnostic) = attempt.diagnostic() {
                    lines.push(format!("- {}: {}", attempt.backend, diagnostic));
                }
            }
            lines.join("\n")
        }
        DownloadError::PostProcess { .. } => {
            "The file was downloaded but could not be prepared for delivery. Please try again."
                .to_string()
        }
    }
}

fn welcome_text() -> String {
    "I download videos from links you send me.\n\n\
     Send a URL from YouTube, TikTok, Instagram, Twitter/X, Facebook, Vimeo, \
     Dailymotion or Twitch, or a direct link to a video file (mp4, mov, mkv, webm, ...).\n\n\
     I pick the best downloader for the platform, fall back to the others when it \
     fails, split oversized files into parts, and delete every temporary file \
     afterwards.\n\n\
     Use /help for details."
        .to_string()
}

fn help_text(config: &Config) -> String {
    format!(
        "{commands}\n\n\
         Supported platforms: YouTube, TikTok, Instagram, Twitter/X, Facebook, \
         Vimeo, Dailymotion, Twitch.\n\
         Direct file links: mp4, avi, mov, mkv, webm, flv, wmv, m4v, 3gp, ogv.\n\n\
         How a request is handled:\n\
         1. The link is classified by platform.\n\
         2. Downloaders are tried in order for that platform \
         (yt-dlp, youtube-dl, instaloader, direct fetch).\n\
         3. Files over {part_limit} are split into parts before sending.\n\
         4. Downloads over {total_limit} are rejected.\n\
         5. Temporary files are always removed, whether the download worked or not.",
        commands = Command::descriptions(),
        part_limit = format_size(config.max_part_size),
        total_limit = format_size(config.max_total_size),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Backend, BackendError, DownloadAttempt};

    #[test]
    fn test_describe_failure_lists_every_attempt() {
        let err = DownloadError::Exhausted {
            url: "https://example.com/clip".to_string(),
            attempts: vec![
                DownloadAttempt {
                    backend: Backend::YtDlp,
                    elapsed: Duration::from_secs(1),
                    outcome: Err(BackendError::Unavailable("yt-dlp")),
                },
                DownloadAttempt {
                    backend: Backend::DirectEnhanced,
                    elapsed: Duration::from_secs(2),
                    outcome: Err(BackendError::Rejected("HTTP 403 Forbidden".to_string())),
                },
            ],
        };

        let text = describe_failure(&err);
        assert!(text.contains("yt-dlp"));
        assert!(text.contains("not installed"));
        assert!(text.contains("HTTP 403 Forbidden"));
    }

    #[test]
    fn test_help_text_mentions_the_configured_limits() {
        let config = Config::default();
        let text = help_text(&config);
        assert!(text.contains("50.0 MiB"));
        assert!(text.contains("2.0 GiB"));
    }
}
