use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use gpeasy::backends::openai::OpenAI;
use gpeasy::{AdvancedChatStream, AppConfig, Conversation, Preset, SimpleChat, StreamHandle};

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Empty,
    Query(String),
    Directive(String),
    Edit(usize, String),
    History,
    Quit,
    Unknown(String),
}

fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Line::Query(line.to_string());
    };
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "quit" | "exit" => Line::Quit,
        "history" => Line::History,
        "directive" if !rest.is_empty() => Line::Directive(rest.to_string()),
        "edit" => {
            let (index, text) = rest.split_once(' ').unwrap_or((rest, ""));
            match index.parse() {
                Ok(index) if !text.trim().is_empty() => Line::Edit(index, text.trim().to_string()),
                _ => Line::Unknown(line.to_string()),
            }
        }
        _ => Line::Unknown(line.to_string()),
    }
}

struct Session {
    conversation: Conversation,
    text: SimpleChat,
    streamed: AdvancedChatStream,
    stream: bool,
}

impl Session {
    async fn ask<W>(&self, out: &mut W, edit: Option<usize>, content: &str) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if !self.stream {
            let reply = match edit {
                Some(index) => self.text.edit_conversation(index, content).await?,
                None => self.text.query(content).await?,
            };
            out.write_all(format!("{reply}\n").as_bytes()).await?;
            return Ok(());
        }

        let handle = match edit {
            Some(index) => self.streamed.edit_conversation(index, content).await?,
            None => self.streamed.query(content).await?,
        };
        self.drain(out, handle).await?;
        out.write_all(b"\n").await?;
        Ok(())
    }

    async fn drain<W>(&self, out: &mut W, handle: StreamHandle) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let drained = tokio::select! {
            result = handle.drain(out) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        match drained {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => {
                self.conversation.commit_response_text(String::new()).await?;
                Err(e.into())
            }
            None => {
                handle.close().await?;
                log::info!("reply interrupted");
                self.conversation.commit_response_text(String::new()).await?;
                Ok(())
            }
        }
    }

    async fn history<W>(&self, out: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        for (index, message) in self.conversation.get_conversation().await?.iter().enumerate() {
            out.write_all(format!("[{index}] {}: {}\n", message.role, message.content).as_bytes())
                .await?;
        }
        Ok(())
    }
}

pub async fn run(
    config: AppConfig,
    preset: &str,
    model: Option<&str>,
    stream: bool,
) -> anyhow::Result<()> {
    let preset: Preset = preset.parse()?;
    let backend = Arc::new(OpenAI::new(config.client.clone())?);
    let conversation =
        Conversation::new(backend).with_default_model(config.client.default_model.clone());
    conversation.init(preset, model.unwrap_or("")).await?;
    log::debug!("chat session {} ready", conversation.id());

    let session = Session {
        text: SimpleChat::from_conversation(conversation.clone()),
        streamed: AdvancedChatStream::from_conversation(conversation.clone()),
        conversation,
        stream,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();
    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;
        let Some(raw) = lines.next_line().await? else {
            break;
        };
        let result = match parse_line(&raw) {
            Line::Empty => Ok(()),
            Line::Quit => break,
            Line::History => session.history(&mut out).await,
            Line::Directive(text) => session
                .conversation
                .add_directive(&text)
                .await
                .map_err(Into::into),
            Line::Edit(index, text) => session.ask(&mut out, Some(index), &text).await,
            Line::Query(text) => session.ask(&mut out, None, &text).await,
            Line::Unknown(line) => Err(anyhow::anyhow!(
                "unknown command {line:?}; try /directive, /edit N TEXT, /history or /quit"
            )),
        };
        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    }
    Ok(())
}
