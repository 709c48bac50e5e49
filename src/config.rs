use crate::ai;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// schoold - school portal state sidecar (JSON lines on stdin/stdout)
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "schoold")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Workspace directory to open at startup
    #[arg(long, env = "SCHOOLD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter (tracing EnvFilter syntax), written to stderr
    #[arg(long, env = "SCHOOLD_LOG", default_value = "info")]
    pub log_level: String,

    /// Streaming chat endpoint used by the student AI assistant
    #[arg(long, env = "SCHOOLD_AI_CHAT_URL")]
    pub ai_chat_url: Option<String>,

    /// Bearer key sent to the AI endpoint
    #[arg(long, env = "SCHOOLD_AI_CHAT_KEY", hide_env_values = true)]
    pub ai_chat_key: Option<String>,
}

impl Config {
    pub fn ai_endpoint(&self) -> Option<ai::Endpoint> {
        let url = self.ai_chat_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(ai::Endpoint {
            url: url.to_string(),
            key: self.ai_chat_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

/// Stdout carries the protocol, so logs go to stderr.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cfg = Config::try_parse_from([
            "schoold",
            "--workspace",
            "/tmp/ws",
            "--ai-chat-url",
            "http://localhost:9/chat",
            "--ai-chat-key",
            "k",
        ])
        .expect("parse");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
        let ep = cfg.ai_endpoint().expect("endpoint");
        assert_eq!(ep.url, "http://localhost:9/chat");
        assert_eq!(ep.key.as_deref(), Some("k"));
    }

    #[test]
    fn blank_url_means_no_endpoint() {
        let cfg = Config {
            ai_chat_url: Some("  ".into()),
            ..Default::default()
        };
        assert!(cfg.ai_endpoint().is_none());
    }
}
