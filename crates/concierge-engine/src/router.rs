//! Lightweight intent classification.
//!
//! The router turns a raw message into a category plus keyword signals.
//! Both are hints for the planner, never authoritative: the planner may
//! override the category, and nothing downstream executes because of a
//! signal alone. Classification never fails; anything unrecognized lands
//! in [`IntentCategory::Conversational`], the safe non-destructive path.

use std::collections::BTreeSet;

use concierge_core::ConversationTurn;

/// Closed set of message categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentCategory {
    /// The message asks for an action backed by a tool.
    ToolUse,
    /// The message asks a question answerable from the knowledge base.
    KnowledgeLookup,
    /// Small talk or anything unrecognized.
    Conversational,
    /// Recognized but explicitly outside what the system does.
    Unsupported,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::ToolUse => "tool_use",
            IntentCategory::KnowledgeLookup => "knowledge_lookup",
            IntentCategory::Conversational => "conversational",
            IntentCategory::Unsupported => "unsupported",
        }
    }
}

/// Keyword signals the router extracts as planner hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Signal {
    CalendarIntent,
    EmailIntent,
    DeleteIntent,
    SearchIntent,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::CalendarIntent => "calendar-intent",
            Signal::EmailIntent => "email-intent",
            Signal::DeleteIntent => "delete-intent",
            Signal::SearchIntent => "search-intent",
        }
    }
}

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: IntentCategory,
    pub signals: BTreeSet<Signal>,
}

const CALENDAR_WORDS: &[&str] = &[
    "calendar", "meeting", "event", "schedule", "appointment", "reschedule",
];
const EMAIL_WORDS: &[&str] = &["email", "e-mail", "inbox", "mail"];
const DELETE_WORDS: &[&str] = &["delete", "remove", "cancel", "clear out"];
const SEARCH_WORDS: &[&str] = &["what is", "who is", "look up", "search", "tell me about"];
const UNSUPPORTED_WORDS: &[&str] = &["play music", "phone call", "turn on", "turn off"];

/// Classify a message given a bounded window of prior turns.
///
/// History only contributes signals (a follow-up like "cancel it" inherits
/// the calendar signal from the previous turn); the category comes from
/// the message itself.
pub fn classify(message: &str, recent_history: &[ConversationTurn]) -> Classification {
    let lower = message.to_lowercase();
    let mut signals = signals_in(&lower);

    if !signals.contains(&Signal::CalendarIntent) && !signals.contains(&Signal::EmailIntent) {
        for turn in recent_history.iter().rev().take(2) {
            for msg in &turn.messages {
                let prior = signals_in(&msg.text.to_lowercase());
                signals.extend(
                    prior
                        .into_iter()
                        .filter(|s| matches!(s, Signal::CalendarIntent | Signal::EmailIntent)),
                );
            }
        }
    }

    let category = if UNSUPPORTED_WORDS.iter().any(|w| lower.contains(w)) {
        IntentCategory::Unsupported
    } else if signals.contains(&Signal::CalendarIntent) || signals.contains(&Signal::EmailIntent) {
        IntentCategory::ToolUse
    } else if signals.contains(&Signal::SearchIntent) {
        IntentCategory::KnowledgeLookup
    } else {
        IntentCategory::Conversational
    };

    Classification { category, signals }
}

fn signals_in(lower: &str) -> BTreeSet<Signal> {
    let mut signals = BTreeSet::new();
    if CALENDAR_WORDS.iter().any(|w| lower.contains(w)) {
        signals.insert(Signal::CalendarIntent);
    }
    if EMAIL_WORDS.iter().any(|w| lower.contains(w)) {
        signals.insert(Signal::EmailIntent);
    }
    if DELETE_WORDS.iter().any(|w| lower.contains(w)) {
        signals.insert(Signal::DeleteIntent);
    }
    if SEARCH_WORDS.iter().any(|w| lower.contains(w)) {
        signals.insert(Signal::SearchIntent);
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::{ConversationId, ConversationTurn, TurnMessage, TurnMetadata};

    fn no_history() -> Vec<ConversationTurn> {
        Vec::new()
    }

    #[test]
    fn calendar_request_routes_to_tool_use() {
        let c = classify("delete my 3pm meeting tomorrow", &no_history());
        assert_eq!(c.category, IntentCategory::ToolUse);
        assert!(c.signals.contains(&Signal::CalendarIntent));
        assert!(c.signals.contains(&Signal::DeleteIntent));
    }

    #[test]
    fn question_routes_to_knowledge_lookup() {
        let c = classify("what is the travel policy?", &no_history());
        assert_eq!(c.category, IntentCategory::KnowledgeLookup);
        assert!(c.signals.contains(&Signal::SearchIntent));
    }

    #[test]
    fn unknown_input_fails_open_to_conversational() {
        let c = classify("hey there!", &no_history());
        assert_eq!(c.category, IntentCategory::Conversational);
        assert!(c.signals.is_empty());

        let c = classify("", &no_history());
        assert_eq!(c.category, IntentCategory::Conversational);
    }

    #[test]
    fn out_of_scope_request_is_unsupported() {
        let c = classify("play music in the kitchen", &no_history());
        assert_eq!(c.category, IntentCategory::Unsupported);
    }

    #[test]
    fn follow_up_inherits_calendar_signal_from_history() {
        let history = vec![ConversationTurn::new(
            ConversationId::generate(),
            vec![
                TurnMessage::user("show my meetings for today"),
                TurnMessage::assistant("You have one meeting at 3pm."),
            ],
            TurnMetadata::default(),
        )];
        let c = classify("cancel it", &history);
        assert!(c.signals.contains(&Signal::CalendarIntent));
        assert_eq!(c.category, IntentCategory::ToolUse);
    }
}
