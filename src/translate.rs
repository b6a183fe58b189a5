//! The translation workflow: decide per file and per locale whether a
//! translation is stale, obtain a full LLM completion (with bounded
//! auto-continuation when streaming), and write the results back into
//! the localized template tree.
//!
//! The whole pass is strictly sequential: one LLM client, no fan-out
//! across files or locales, so log order matches processing order and
//! rate limits stay predictable.

use crate::config::Config;
use crate::files::{localized_path, mtime_iso, replace_ext, to_iso, write_text};
use crate::gateway::{ChatMessage, CompletionGateway};
use crate::scanner::sync_with_filesystem;
use crate::store::TranslationStore;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info};

/// Marker closing a complete file block in a model response.
pub const END_MARKER: &str = "---END FILE---";

/// Upper bound on completion requests per file+locale, counting the
/// initial request and every "Continue." follow-up.
pub const MAX_COMPLETION_ATTEMPTS: u32 = 10;

const SYSTEM_PROMPT: &str = r#"You are translating an HTML template of a file-based CMS from its source language into a target language.

The input contains:
- The template content in the source language (HTML, possibly with template expressions).
- Optional instructions specific to this file.

Your task:
- Translate the human-readable text and leave markup, attributes, and template expressions intact.
- If translation is possible, return the translated template in the exact format below.
- If translation is not possible, return only a short plain-text explanation, without file markers.

Reply in this exact format when translation succeeds:

---FILE: translated_filename.html---
<translated template content>
---END FILE---

Do not include any extra text or comments outside of these instructions.
"#;

/// A parsed `---FILE: ...---`/`---END FILE---` response block.
#[derive(Debug, PartialEq, Eq)]
pub struct FileBlock {
    pub name: String,
    pub content: String,
}

/// Extract the first file block from a model response.
pub fn parse_file_block(response: &str) -> Option<FileBlock> {
    let re = Regex::new(r"---FILE: (.+?)---\n(?s:(.*?))\n---END FILE---").expect("valid pattern");
    let caps = re.captures(response)?;
    Some(FileBlock {
        name: caps[1].to_string(),
        content: caps[2].to_string(),
    })
}

/// Obtain one full completion for `messages`.
///
/// Non-streaming mode issues a single request. Streaming mode keeps
/// requesting continuations (appending the assistant's partial output
/// and a `"Continue."` user turn) until the accumulated text contains
/// [`END_MARKER`] or [`MAX_COMPLETION_ATTEMPTS`] requests were made,
/// and returns whatever accumulated either way.
pub async fn fetch_full_completion(
    gateway: &dyn CompletionGateway,
    messages: &mut Vec<ChatMessage>,
    stream: bool,
) -> Result<String> {
    if !stream {
        return gateway.complete(messages).await;
    }

    let mut full = String::new();
    let mut attempts = 0;
    while attempts < MAX_COMPLETION_ATTEMPTS {
        let part = gateway.stream_completion(messages).await?;
        full.push_str(&part);
        if full.contains(END_MARKER) {
            break;
        }
        messages.push(ChatMessage::assistant(part));
        messages.push(ChatMessage::user("Continue."));
        attempts += 1;
    }
    Ok(full)
}

/// Run the translation pass over every tracked template.
///
/// Aborts the whole run on the first response that does not match the
/// file-block format, after persisting the raw response to an
/// `.answer.md` sidecar next to the intended output.
pub async fn run(config: &Config, gateway: &dyn CompletionGateway) -> Result<()> {
    let locale_base = &config.locale_base_translate;

    let mut store = TranslationStore::new(&config.root_path);
    store.load().await?;
    sync_with_filesystem(config, &mut store)?;
    store.save().await?;

    let rel_paths: Vec<String> = store.data().keys().cloned().collect();
    for rel_path in rel_paths {
        let path_base = localized_path(&config.root_path, locale_base, &rel_path);
        let mtime_disk = mtime_iso(&path_base).await?;

        let mtime_db = store.get_mtime(&rel_path, locale_base).map(str::to_string);
        let has_changed = mtime_db.as_deref().map_or(true, |db| db < mtime_disk.as_str());

        if has_changed {
            // recorded before any translation attempt, so a later crash
            // re-attempts the translation, not the change detection
            store.set_mtime(&rel_path, locale_base, &mtime_disk);
            info!("Updated the last changed date for the base template '{rel_path}'.");
        } else {
            info!("The base template '{rel_path}' is not changed.");
        }

        let base_text = tokio::fs::read_to_string(&path_base)
            .await
            .with_context(|| format!("Failed to read {}", path_base.display()))?;

        for locale in &config.locale_allowed {
            if locale == locale_base {
                continue;
            }

            let mtime_trans = store.get_mtime(&rel_path, locale);
            let needs_translate =
                has_changed || mtime_trans.map_or(true, |t| t < mtime_disk.as_str());
            if !needs_translate {
                continue;
            }

            info!("Translate template '{rel_path}' from '{locale_base}' to '{locale}'.");

            let path_trans = localized_path(&config.root_path, locale, &rel_path);
            let path_prompt = replace_ext(&path_trans, ".prompt.md");
            let prompt_text = tokio::fs::read_to_string(&path_prompt).await.ok();

            let mut messages = vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Translate template \"{rel_path}\" from {locale_base} to {locale}."
                )),
            ];
            if let Some(text) = prompt_text {
                messages.push(ChatMessage::user(text));
            }
            messages.push(ChatMessage::user(base_text.clone()));

            let content = fetch_full_completion(gateway, &mut messages, config.ai_stream).await?;
            info!("LLM translation completed.");

            let Some(block) = parse_file_block(&content) else {
                error!("Failed to extract generated file from response.");
                let path_answer = replace_ext(&path_trans, ".answer.md");
                write_text(&path_answer, &content).await?;
                bail!(
                    "Unexpected AI output format; raw response saved to {}",
                    path_answer.display()
                );
            };
            debug!("Model returned file block named '{}'", block.name);

            write_text(&path_trans, &block.content).await?;
            info!("Generated result saved to '{}'", path_trans.display());

            store.set_mtime(&rel_path, locale, &to_iso(Utc::now()));
            store.save().await?;
        }
    }

    Ok(())
}
