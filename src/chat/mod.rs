//! Turn engine and interactive chat loop.
//!
//! Per-session lifecycle: a document is loaded once, then turns alternate
//! between awaiting input and streaming a reply. A turn only completes after
//! the full response is drained and its usage record appended; an
//! interrupted stream commits neither the assistant turn nor the record and
//! drops back to awaiting input.

use crate::ledger::TokenLedger;
use crate::llm::{CompletionProvider, GatewayError};
use crate::session::{sanitize_reply, SessionContext};
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Drive one conversation turn.
///
/// Appends the user turn, streams the reply (sanitized fragments go to
/// `on_fragment` in order), records token usage, and appends the sanitized
/// assistant turn. On a stream interruption the pending user turn is rolled
/// back so a retry replays a clean transcript, and nothing is recorded.
pub async fn run_turn(
    session: &mut SessionContext,
    provider: &dyn CompletionProvider,
    ledger: &TokenLedger,
    input: &str,
    on_fragment: &(dyn Fn(&str) + Send + Sync),
) -> Result<String, GatewayError> {
    session.append_user(input);
    let messages = session.replay();

    let sanitizing = |fragment: &str| on_fragment(&sanitize_reply(fragment));
    let raw = match provider
        .stream_chat(&messages, session.user_id(), &sanitizing)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            session.discard_pending_user();
            return Err(e);
        }
    };

    let reply = sanitize_reply(&raw);

    // Usage accounting is best-effort: local append first, then the remote
    // attempt; neither failure blocks the turn.
    let tokens = ledger.count(&reply);
    if let Err(e) = ledger.record(tokens).await {
        tracing::warn!(error = %e, tokens, "usage record incomplete; local ledger is authoritative");
    }
    tracing::debug!(tokens, "assistant turn completed");

    session.append_assistant(reply.clone());
    Ok(reply)
}

/// Interactive loop: read a line, stream the reply, repeat.
///
/// `/clear` empties the conversation (grounding stays), `/quit` exits.
pub async fn run_repl(
    mut session: SessionContext,
    provider: Box<dyn CompletionProvider>,
    ledger: TokenLedger,
) -> Result<()> {
    println!(
        "Loaded a {} ({} characters). Ask away; /clear resets the conversation, /quit exits.",
        session.document().kind(),
        session.document().text().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nyou> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.reset();
                println!("Conversation cleared; the document is still loaded.");
                continue;
            }
            _ => {}
        }

        print!("\nina> ");
        std::io::stdout().flush().ok();

        let print_fragment = |fragment: &str| {
            print!("{fragment}");
            std::io::stdout().flush().ok();
        };

        // A failed turn already rolled back its pending user message, so on
        // anything transient the conversation stays intact and the loop
        // re-prompts. Credential-class errors end the session.
        match run_turn(&mut session, provider.as_ref(), &ledger, input, &print_fragment).await {
            Ok(_) => println!(),
            Err(e) if e.is_interruption() => {
                eprintln!("\n[response interrupted; partial text discarded — send again to retry]");
            }
            Err(e) if e.is_recoverable() => {
                eprintln!("\n[{e}; the conversation is intact — send again to retry]");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, Role};
    use crate::session::Document;
    use crate::source::SourceKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned fragments, capturing what was sent.
    struct FakeProvider {
        fragments: Vec<&'static str>,
        fail_after: Option<usize>,
        error: Option<fn() -> GatewayError>,
        seen: Mutex<Vec<(Vec<Message>, String)>>,
    }

    impl FakeProvider {
        fn replying(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                fail_after: None,
                error: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn interrupting_after(fragments: Vec<&'static str>, after: usize) -> Self {
            Self {
                fragments,
                fail_after: Some(after),
                error: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing_with(error: fn() -> GatewayError) -> Self {
            Self {
                fragments: Vec::new(),
                fail_after: None,
                error: Some(error),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn stream_chat(
            &self,
            messages: &[Message],
            user_id: &str,
            on_fragment: &(dyn for<'a> Fn(&'a str) + Send + Sync),
        ) -> Result<String, GatewayError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), user_id.to_string()));

            if let Some(make_error) = self.error {
                return Err(make_error());
            }

            let mut full = String::new();
            for (i, fragment) in self.fragments.iter().enumerate() {
                if self.fail_after == Some(i) {
                    return Err(GatewayError::StreamInterrupted("cut".to_string()));
                }
                full.push_str(fragment);
                on_fragment(fragment);
            }
            Ok(full)
        }
    }

    fn fixtures(dir: &tempfile::TempDir) -> (SessionContext, TokenLedger) {
        let session = SessionContext::build(Document::new(SourceKind::Text, "Hello world"));
        let ledger = TokenLedger::new(dir.path().join("token_usage.txt"), None).unwrap();
        (session, ledger)
    }

    #[tokio::test]
    async fn completed_turn_appends_sanitized_reply_and_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, ledger) = fixtures(&dir);
        let provider = FakeProvider::replying(vec!["Total: ", "$50"]);

        let reply = run_turn(
            &mut session,
            &provider,
            &ledger,
            "How much?",
            &|_: &str| {},
        )
        .await
        .unwrap();

        assert_eq!(reply, "Total: S50");
        let messages = session.replay();
        assert_eq!(messages.last().unwrap().role, Role::Assistant);
        assert_eq!(messages.last().unwrap().content, "Total: S50");
        assert_eq!(ledger.read_local().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replayed_sequence_embeds_document_and_literal_input() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, ledger) = fixtures(&dir);
        let provider = FakeProvider::replying(vec!["It says hello."]);

        run_turn(
            &mut session,
            &provider,
            &ledger,
            "What does the document say?",
            &|_: &str| {},
        )
        .await
        .unwrap();

        let seen = provider.seen.lock().unwrap();
        let (messages, user_id) = &seen[0];
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Hello world"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "What does the document say?");
        assert_eq!(user_id, "default_user");
    }

    #[tokio::test]
    async fn interrupted_stream_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, ledger) = fixtures(&dir);
        let provider = FakeProvider::interrupting_after(vec!["partial ", "text"], 1);

        let err = run_turn(&mut session, &provider, &ledger, "hi", &|_: &str| {})
            .await
            .unwrap_err();

        assert!(err.is_interruption());
        assert_eq!(session.turn_count(), 0);
        assert!(ledger.read_local().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rate_limited_turn_leaves_earlier_conversation_intact() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, ledger) = fixtures(&dir);

        let provider = FakeProvider::replying(vec!["first answer"]);
        run_turn(&mut session, &provider, &ledger, "first?", &|_: &str| {})
            .await
            .unwrap();

        let provider = FakeProvider::failing_with(|| GatewayError::RateLimited("quota".into()));
        let err = run_turn(&mut session, &provider, &ledger, "second?", &|_: &str| {})
            .await
            .unwrap_err();

        // Recoverable: the earlier exchange survives, the failed user turn
        // is rolled back, and nothing extra was recorded.
        assert!(err.is_recoverable());
        assert_eq!(session.turn_count(), 2);
        assert_eq!(
            session.replay().last().unwrap().content,
            "first answer"
        );
        assert_eq!(ledger.read_local().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fragments_reach_the_caller_sanitized_and_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, ledger) = fixtures(&dir);
        let provider = FakeProvider::replying(vec!["a $1", " then", " $2"]);

        let collected = Mutex::new(String::new());
        run_turn(&mut session, &provider, &ledger, "hi", &|fragment: &str| {
            collected.lock().unwrap().push_str(fragment);
        })
        .await
        .unwrap();

        assert_eq!(*collected.lock().unwrap(), "a S1 then S2");
    }

    #[tokio::test]
    async fn ledger_is_monotonic_across_turns() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, ledger) = fixtures(&dir);
        let provider = FakeProvider::replying(vec!["short reply"]);

        for _ in 0..3 {
            run_turn(&mut session, &provider, &ledger, "again", &|_: &str| {})
                .await
                .unwrap();
        }

        let counts = ledger.read_local().unwrap();
        assert_eq!(counts.len(), 3);
        assert!(counts.iter().all(|&c| c > 0));
    }
}
