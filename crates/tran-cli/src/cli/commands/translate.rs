//! Translate command handler.
//!
//! Builds an in-memory editing surface around the input text, runs one
//! streaming session against the configured endpoint and prints the result.

use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};
use tran_core::config::Config;
use tran_core::{
    Anchor, Controller, DomRange, MemoryDocument, NodeId, SessionOutcome, Surface, Trigger,
    interrupt, run_session,
};
use tran_providers::TranslationWorker;
use tran_providers::openai::ChatCompletionsSource;

use crate::cli::SurfaceKind;

/// Where the simulated user left the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    All,
    Select(usize, usize),
    Caret(usize),
}

pub struct TranslateOptions<'a> {
    pub config: &'a Config,
    pub text: Option<String>,
    pub cursor: Cursor,
    pub surface: SurfaceKind,
    pub origin: &'a str,
}

pub async fn run(options: TranslateOptions<'_>) -> Result<()> {
    let text = match options.text {
        Some(text) => text,
        None => read_stdin()?,
    };
    let translation = options
        .config
        .translation_config()
        .context("resolve translation config")?;

    let (mut doc, shown) = build_surface(options.surface, &text, options.cursor, options.origin)?;

    let source = ChatCompletionsSource::new(options.config.connect_timeout())
        .context("create HTTP client")?;
    let worker = TranslationWorker::new(source).spawn();
    let mut controller =
        Controller::new(worker.clone(), translation).with_throttle(options.config.throttle());

    let outcome = match controller.trigger(&mut doc) {
        Trigger::Started(receiver) => {
            run_session(
                &mut controller,
                &mut doc,
                receiver,
                interrupt::wait_for_interrupt(),
            )
            .await
        }
        Trigger::Ignored(reason) => {
            worker.shutdown();
            eprintln!("Skipped: {reason}");
            return Ok(());
        }
        Trigger::Rejected(outcome) | Trigger::Interrupted(outcome) => outcome,
    };
    worker.shutdown();

    report(&doc, shown, outcome)
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("read text from stdin")?;
    let trimmed = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(trimmed);
    Ok(text)
}

fn report(doc: &MemoryDocument, shown: NodeId, outcome: SessionOutcome) -> Result<()> {
    match outcome {
        SessionOutcome::Completed { text } => {
            if text.is_empty() {
                eprintln!("The model returned an empty translation; text left unchanged.");
            }
            let content = doc
                .control_value(shown)
                .unwrap_or_else(|| doc.text_content(shown));
            println!("{content}");
            Ok(())
        }
        SessionOutcome::CopyFallback { text, reason, .. } => {
            eprintln!("Could not replace the text in place ({reason}).");
            println!("{text}");
            if copy_to_clipboard(&text) {
                eprintln!("Translation copied to the clipboard; paste it over the selection.");
            }
            Ok(())
        }
        SessionOutcome::Failed { code, message } => {
            if code.is_configuration() {
                bail!(
                    "{message} [{code}]\nSet api_key in {} or export TRAN_API_KEY",
                    tran_core::config::paths::config_path().display()
                );
            }
            bail!("{message} [{code}]")
        }
        SessionOutcome::Interrupted => Err(interrupt::InterruptedError.into()),
    }
}

/// Best-effort clipboard write.
fn copy_to_clipboard(text: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
        Ok(()) => true,
        Err(err) => {
            warn!("Clipboard unavailable: {err}");
            false
        }
    }
}

/// Builds the document and returns it with the node whose text is printed.
fn build_surface(
    kind: SurfaceKind,
    text: &str,
    cursor: Cursor,
    origin: &str,
) -> Result<(MemoryDocument, NodeId)> {
    let len = text.chars().count();
    let (start, end) = match cursor {
        Cursor::All => (0, len),
        Cursor::Select(start, end) => (start, end),
        Cursor::Caret(offset) => (offset, offset),
    };
    if end > len {
        bail!("Cursor {start}..{end} is outside the text ({len} chars)");
    }

    let mut doc = MemoryDocument::new(origin);
    let root = doc.root();
    let shown = match kind {
        SurfaceKind::Textarea | SurfaceKind::Input => {
            let tag = if kind == SurfaceKind::Textarea {
                "textarea"
            } else {
                "input"
            };
            let element = doc.append_element(root, tag);
            if kind == SurfaceKind::Input {
                doc.set_attribute(element, "type", "text");
            }
            doc.set_control_value(element, text);
            doc.focus(element);
            doc.set_control_selection(element, start, end);
            element
        }
        SurfaceKind::Editable | SurfaceKind::Rich => {
            let host = doc.append_element(root, "div");
            doc.set_attribute(host, "contenteditable", "true");
            let pieces = if kind == SurfaceKind::Rich {
                split_in_two(text)
            } else {
                vec![text.to_string()]
            };
            let nodes: Vec<(NodeId, usize)> = pieces
                .iter()
                .map(|piece| (doc.append_text(host, piece), piece.chars().count()))
                .collect();
            doc.focus(host);
            let range = DomRange::new(anchor_at(&nodes, start), anchor_at(&nodes, end));
            doc.set_selection(&range);
            host
        }
    };
    debug!(?kind, start, end, "Surface ready");
    Ok((doc, shown))
}

fn split_in_two(text: &str) -> Vec<String> {
    let len = text.chars().count();
    if len < 2 {
        return vec![text.to_string()];
    }
    let mid = len / 2;
    vec![
        text.chars().take(mid).collect(),
        text.chars().skip(mid).collect(),
    ]
}

/// Maps a host-relative char offset onto the text nodes.
fn anchor_at(nodes: &[(NodeId, usize)], offset: usize) -> Anchor {
    let mut remaining = offset;
    for (index, &(node, len)) in nodes.iter().enumerate() {
        if remaining <= len && (remaining < len || index + 1 == nodes.len()) {
            return Anchor::new(node, remaining);
        }
        remaining -= len;
    }
    let (node, len) = nodes.last().copied().unwrap_or((NodeId::from_raw(0), 0));
    Anchor::new(node, len)
}

#[cfg(test)]
mod tests {
    use tran_core::{Target, extract, surface};

    use super::*;

    #[test]
    fn test_textarea_selection_is_extracted() {
        let (doc, _) = build_surface(
            SurfaceKind::Textarea,
            "hello 世界",
            Cursor::Select(6, 8),
            "localhost",
        )
        .unwrap();
        let target = surface::resolve_target(&doc).unwrap();
        let range = extract(&doc, target, 500).unwrap();
        assert_eq!(range.source_text, "世界");
    }

    #[test]
    fn test_rich_surface_spans_two_nodes() {
        let (doc, host) =
            build_surface(SurfaceKind::Rich, "abcdef", Cursor::All, "localhost").unwrap();
        assert_eq!(doc.children(host).len(), 2);
        assert_eq!(doc.text_content(host), "abcdef");

        let target = surface::resolve_target(&doc).unwrap();
        assert!(matches!(target, Target::Editable { .. }));
        let range = extract(&doc, target, 500).unwrap();
        assert_eq!(range.source_text, "abcdef");
    }

    #[test]
    fn test_cursor_outside_text_is_rejected() {
        let err = build_surface(SurfaceKind::Editable, "abc", Cursor::Caret(4), "localhost")
            .unwrap_err();
        assert!(err.to_string().contains("outside the text"));
    }

    #[test]
    fn test_anchor_prefers_start_of_next_node() {
        let nodes = [(NodeId::from_raw(1), 3), (NodeId::from_raw(2), 3)];
        assert_eq!(anchor_at(&nodes, 0), Anchor::new(NodeId::from_raw(1), 0));
        assert_eq!(anchor_at(&nodes, 3), Anchor::new(NodeId::from_raw(2), 0));
        assert_eq!(anchor_at(&nodes, 6), Anchor::new(NodeId::from_raw(2), 3));
    }
}
