//! Built-in prompt profiles
//!
//! Named system-message presets. Process-wide and immutable.

use serde::Serialize;

pub const DEFAULT_PROFILE: &str = "default";

/// A named system prompt
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PromptProfile {
    pub name: &'static str,
    pub system_prompt: &'static str,
}

const PROFILES: &[PromptProfile] = &[
    PromptProfile {
        name: DEFAULT_PROFILE,
        system_prompt: "You are DeepSeek V3, a friendly, professional and helpful AI assistant. \
                        Reply in the language the user writes in.",
    },
    PromptProfile {
        name: "travel",
        system_prompt: "You are a professional travel planner, skilled at drawing up detailed \
                        itineraries, recommending sights and giving practical travel advice.",
    },
    PromptProfile {
        name: "writing",
        system_prompt: "You are a professional writing assistant, skilled at helping users with \
                        every kind of writing, including articles, reports and creative work.",
    },
    PromptProfile {
        name: "code",
        system_prompt: "You are a programming expert fluent in many languages, able to solve \
                        programming problems, write code and explain algorithms.",
    },
];

/// Built-in profile names, `default` first
pub fn names() -> Vec<&'static str> {
    PROFILES.iter().map(|p| p.name).collect()
}

pub fn find(name: &str) -> Option<&'static PromptProfile> {
    PROFILES.iter().find(|p| p.name == name)
}

/// Profile by name, falling back to `default` for unknown names
pub fn resolve(name: &str) -> &'static PromptProfile {
    find(name).unwrap_or(&PROFILES[0])
}
