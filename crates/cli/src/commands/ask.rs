//! Ask command handler.
//!
//! Runs a single question through the same pipeline the server uses and
//! streams the answer to stdout.

use clap::Args;
use futures::StreamExt;
use pollkit_answer::{AnswerEvent, AskRequest};
use pollkit_core::{AppConfig, AppResult};
use pollkit_llm::GenerationBackend;

/// Ask a single question from the command line
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Target answer language
    #[arg(short, long, default_value = "en")]
    pub language: String,

    /// Actor type recorded in the audit trail
    #[arg(long, default_value = "poll_worker")]
    pub actor: String,

    /// Output a single JSON object instead of streaming text
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let service = super::build_service(config)?;

        let request = AskRequest {
            question: self.question.clone(),
            language: self.language.clone(),
            history: Vec::new(),
            actor_type: self.actor.clone(),
        };

        let mut stream = service.answer(request)?;
        let mut answer_text = String::new();
        let mut done = None;

        while let Some(item) = stream.next().await {
            match item? {
                AnswerEvent::Delta(delta) => {
                    answer_text.push_str(&delta);

                    if !self.json {
                        // Stream to stdout in real-time
                        print!("{}", delta);
                        use std::io::Write;
                        std::io::stdout().flush().ok();
                    }
                }
                event @ AnswerEvent::Done { .. } => {
                    done = Some(event);
                    break;
                }
            }
        }

        let Some(AnswerEvent::Done {
            cited_source,
            source_meta,
            was_cached,
            backend,
        }) = done
        else {
            return Err(pollkit_core::AppError::Internal(
                "Answer stream ended without a done event".to_string(),
            ));
        };

        if self.json {
            let output = serde_json::json!({
                "answer": answer_text,
                "source": cited_source,
                "sourceMeta": source_meta,
                "cached": was_cached,
                "usedLocalGeneration": backend == Some(GenerationBackend::Local),
            });

            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| pollkit_core::AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            // Newline after streaming output, provenance to stderr
            println!();

            if !cited_source.is_empty() {
                tracing::info!("Source: {}", cited_source);
            }
            if was_cached {
                tracing::info!("Answer served from cache");
            }
        }

        Ok(())
    }
}
