//! Conversational session state: the grounding document, the derived system
//! instruction, and the ordered transcript replayed on every turn.
//!
//! A session is an owned value passed into every core call; nothing here
//! reads or writes ambient process state. It lives in memory only and is
//! replaced wholesale when a new document is loaded.

use crate::llm::Message;
use crate::source::SourceKind;

/// User identity attached to completion requests when none is provided.
pub const DEFAULT_USER_ID: &str = "default_user";

/// Immutable grounding document: the normalized text plus its source tag.
#[derive(Debug, Clone)]
pub struct Document {
    kind: SourceKind,
    text: String,
}

impl Document {
    pub fn new(kind: SourceKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Renders the persona template with the document kind and full text.
///
/// Grounding is re-injected as a system-level instruction on every turn
/// rather than retrieved per query; documents here are small-to-medium
/// blobs, so the token cost buys deterministic grounding.
fn render_instruction(document: &Document) -> String {
    format!(
        "You are Ina, a study assistant: friendly, proactive, and precise.\n\
         You have access to the following information, taken from a {kind}:\n\
         \n\
         ####\n\
         {text}\n\
         ####\n\
         \n\
         Base your answers on the information provided above.\n\
         \n\
         If the document reads like \"Just a moment... Enable JavaScript and cookies \
         to continue\", the page blocked the fetch; suggest the user force-refresh it \
         (Ctrl+F5) and load it again.",
        kind = document.kind(),
        text = document.text(),
    )
}

/// Replace every literal `$` with `S`.
///
/// The downstream rendering layer treats `$` as a markup delimiter, so this
/// is a sanitization contract: applied to the complete response, exactly
/// once, before it is surfaced or appended to the transcript.
pub fn sanitize_reply(text: &str) -> String {
    text.replace('$', "S")
}

/// One in-memory chat session grounded in a single document.
#[derive(Debug, Clone)]
pub struct SessionContext {
    instruction: String,
    document: Document,
    turns: Vec<Message>,
    user_id: String,
}

impl SessionContext {
    /// Build a fresh session around a document, replacing any prior context.
    pub fn build(document: Document) -> Self {
        let instruction = render_instruction(&document);
        Self {
            instruction,
            document,
            turns: Vec::new(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn system_instruction(&self) -> &str {
        &self.instruction
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(Message::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Message::assistant(text));
    }

    /// Drop a trailing user turn that never got its assistant reply.
    ///
    /// Used when a stream is interrupted, so a retry replays a transcript
    /// with no half-finished exchange.
    pub fn discard_pending_user(&mut self) {
        if matches!(self.turns.last(), Some(m) if m.role == crate::llm::Role::User) {
            self.turns.pop();
        }
    }

    /// The exact message sequence sent to the completion service:
    /// the system instruction followed by every turn in insertion order.
    pub fn replay(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(Message::system(self.instruction.clone()));
        messages.extend(self.turns.iter().cloned());
        messages
    }

    /// Clear the conversation. Grounding (document and instruction) stays.
    pub fn reset(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn session() -> SessionContext {
        SessionContext::build(Document::new(SourceKind::Text, "Hello world"))
    }

    #[test]
    fn replay_after_build_is_just_the_system_message() {
        let messages = session().replay();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Hello world"));
        assert!(messages[0].content.contains("text file"));
    }

    #[test]
    fn replay_preserves_turn_order() {
        let mut session = session();
        session.append_user("What does the document say?");
        session.append_assistant("It says hello.");

        let messages = session.replay();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(messages[1].content, "What does the document say?");
    }

    #[test]
    fn reset_is_idempotent_and_keeps_grounding() {
        let mut session = session();
        session.append_user("hi");
        session.append_assistant("hello");
        let instruction_before = session.system_instruction().to_string();

        session.reset();
        assert_eq!(session.turn_count(), 0);
        session.reset();
        assert_eq!(session.turn_count(), 0);

        assert_eq!(session.system_instruction(), instruction_before);
        assert_eq!(session.document().text(), "Hello world");
    }

    #[test]
    fn discard_pending_user_removes_only_a_trailing_user_turn() {
        let mut session = session();
        session.append_user("a");
        session.append_assistant("b");
        session.discard_pending_user();
        assert_eq!(session.turn_count(), 2);

        session.append_user("c");
        session.discard_pending_user();
        assert_eq!(session.turn_count(), 2);
    }

    #[test]
    fn sanitize_replaces_every_dollar_sign() {
        assert_eq!(sanitize_reply("Total: $50"), "Total: S50");
        assert_eq!(sanitize_reply("$1 + $2 = $3"), "S1 + S2 = S3");
        assert_eq!(sanitize_reply("no symbols here"), "no symbols here");
    }

    #[test]
    fn default_user_id_applies_until_overridden() {
        assert_eq!(session().user_id(), DEFAULT_USER_ID);
        assert_eq!(session().with_user_id("alice").user_id(), "alice");
    }
}
