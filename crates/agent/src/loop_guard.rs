//! Repetition detection.
//!
//! After every step the runner asks the guard whether the model keeps giving
//! the same answer. If so, a corrective instruction is put in front of the
//! next-step hint so the following request surfaces it.

use stepwise_core::message::{Message, Role};
use tracing::warn;

/// Instruction prepended to the next-step hint when a loop is detected.
pub const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid repeating previously tried ineffective paths.";

#[derive(Debug, Clone, Copy)]
pub struct LoopGuard {
    duplicate_threshold: u32,
}

impl LoopGuard {
    pub fn new(duplicate_threshold: u32) -> Self {
        Self {
            duplicate_threshold,
        }
    }

    pub fn duplicate_threshold(&self) -> u32 {
        self.duplicate_threshold
    }

    /// True when the most recent assistant text exactly matches at least
    /// `duplicate_threshold` earlier assistant messages.
    pub fn is_stuck(&self, history: &[Message]) -> bool {
        if history.len() < 2 {
            return false;
        }

        let Some(last_index) = history.iter().rposition(|m| m.role == Role::Assistant) else {
            return false;
        };
        let last = history[last_index].text();
        if last.is_empty() {
            return false;
        }

        let duplicates = history[..last_index]
            .iter()
            .filter(|m| m.role == Role::Assistant && m.text() == last)
            .count();

        duplicates >= self.duplicate_threshold as usize
    }

    /// Prefix the corrective instruction onto `hint`. Repeated calls keep
    /// prefixing.
    pub fn handle_stuck_state(&self, hint: &mut Option<String>) {
        let existing = hint.take().unwrap_or_default();
        *hint = Some(format!("{STUCK_PROMPT}\n{existing}"));
        warn!(threshold = self.duplicate_threshold, "Repeated responses detected, adding corrective hint");
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::tool::ToolCall;

    fn answers(texts: &[&str]) -> Vec<Message> {
        let mut history = vec![Message::user("question")];
        history.extend(texts.iter().map(|t| Message::assistant(*t)));
        history
    }

    #[test]
    fn too_short_history_is_not_stuck() {
        let guard = LoopGuard::new(1);
        assert!(!guard.is_stuck(&[]));
        assert!(!guard.is_stuck(&[Message::assistant("same")]));
    }

    #[test]
    fn one_earlier_match_below_threshold_two() {
        let guard = LoopGuard::new(2);
        assert!(!guard.is_stuck(&answers(&["I don't know", "I don't know"])));
    }

    #[test]
    fn two_earlier_matches_reach_threshold_two() {
        let guard = LoopGuard::new(2);
        assert!(guard.is_stuck(&answers(&["I don't know", "I don't know", "I don't know"])));
    }

    #[test]
    fn matching_is_exact() {
        let guard = LoopGuard::new(1);
        assert!(!guard.is_stuck(&answers(&["I don't know", "i don't know"])));
        assert!(!guard.is_stuck(&answers(&["I don't know", "I don't know."])));
    }

    #[test]
    fn only_assistant_messages_count() {
        let guard = LoopGuard::new(1);
        let history = vec![Message::user("same"), Message::assistant("same")];
        assert!(!guard.is_stuck(&history));
    }

    #[test]
    fn empty_latest_reply_is_not_stuck() {
        let guard = LoopGuard::new(1);
        let call = ToolCall::new("c1", "date_time", serde_json::json!({}));
        let history = vec![
            Message::user("q"),
            Message::assistant_tool_calls(None, vec![call.clone()]),
            Message::tool_result("c1", "x"),
            Message::assistant_tool_calls(None, vec![call]),
        ];
        assert!(!guard.is_stuck(&history));
    }

    #[test]
    fn trailing_tool_messages_do_not_self_match() {
        let guard = LoopGuard::new(1);
        let call = ToolCall::new("c1", "date_time", serde_json::json!({}));
        let history = vec![
            Message::user("q"),
            Message::assistant_tool_calls(Some("checking".into()), vec![call]),
            Message::tool_result("c1", "x"),
        ];
        assert!(!guard.is_stuck(&history));
    }

    #[test]
    fn stuck_hint_is_cumulative() {
        let guard = LoopGuard::default();
        let mut hint = Some("Use tools.".to_string());
        guard.handle_stuck_state(&mut hint);
        assert_eq!(hint.as_deref(), Some(format!("{STUCK_PROMPT}\nUse tools.").as_str()));

        guard.handle_stuck_state(&mut hint);
        assert_eq!(
            hint.as_deref(),
            Some(format!("{STUCK_PROMPT}\n{STUCK_PROMPT}\nUse tools.").as_str())
        );
    }

    #[test]
    fn stuck_hint_without_existing_hint() {
        let guard = LoopGuard::default();
        let mut hint = None;
        guard.handle_stuck_state(&mut hint);
        assert_eq!(hint.as_deref(), Some(format!("{STUCK_PROMPT}\n").as_str()));
    }
}
