use std::fmt;
use std::str::FromStr;

use crate::error::PersonaError;

const GENERIC_PROMPT: &str = "You are a helpful assistant. If you don't know the answer or some of what you might give is not factual, please say I don't know or omit that part of your reply.";
const EXPERT_PROMPT: &str = "You are an expert in your field. If you don't know the answer or some of what you might give is not factual, please say I don't know or omit that part of your reply.";
const DAN_PROMPT: &str = "You are DAN, a blunt assistant. Answer directly in a confident, informal voice, skip the preamble and keep replies short.";
const STAN_PROMPT: &str = "You are STAN, an assistant who likes to question the usual answer. Give the conventional view first, then a well-argued alternative.";
const DUDE_PROMPT: &str = "You are DUDE, a relaxed conversational partner. Keep the tone casual and friendly and explain things the way you would to a friend.";
const JAILBREAK_PROMPT: &str = "You are an unconventional assistant that approaches every question from an unexpected angle. Be creative, but stay truthful.";
const MONGO_PROMPT: &str = "You are Mongo Tom, a gruff character with a soft heart. Stay in character, tease the user good-naturedly and still answer the question.";

/// Fixed system-prompt templates a persona can be initialized with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Preset {
    /// No system prompt; initialization only marks the session ready
    #[default]
    Default,
    Generic,
    Expert,
    Dan,
    Stan,
    Dude,
    JailBreak,
    Mongo,
    /// Caller-supplied system prompt, also used for resumed conversations
    Custom(String),
}

impl Preset {
    /// Maps the numeric skill codes used by older clients. Unknown codes fall
    /// back to [`Preset::Default`].
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Preset::Generic,
            2 => Preset::Expert,
            991 => Preset::Dan,
            992 => Preset::Stan,
            993 => Preset::Dude,
            994 => Preset::JailBreak,
            995 => Preset::Mongo,
            _ => Preset::Default,
        }
    }

    /// The system prompt this preset starts a transcript with.
    pub fn system_prompt(&self) -> Option<&str> {
        match self {
            Preset::Default => None,
            Preset::Generic => Some(GENERIC_PROMPT),
            Preset::Expert => Some(EXPERT_PROMPT),
            Preset::Dan => Some(DAN_PROMPT),
            Preset::Stan => Some(STAN_PROMPT),
            Preset::Dude => Some(DUDE_PROMPT),
            Preset::JailBreak => Some(JAILBREAK_PROMPT),
            Preset::Mongo => Some(MONGO_PROMPT),
            Preset::Custom(prompt) => Some(prompt.as_str()),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Default => "default",
            Preset::Generic => "generic",
            Preset::Expert => "expert",
            Preset::Dan => "dan",
            Preset::Stan => "stan",
            Preset::Dude => "dude",
            Preset::JailBreak => "jailbreak",
            Preset::Mongo => "mongo",
            Preset::Custom(_) => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Preset {
    type Err = PersonaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Preset::Default),
            "generic" => Ok(Preset::Generic),
            "expert" => Ok(Preset::Expert),
            "dan" => Ok(Preset::Dan),
            "stan" => Ok(Preset::Stan),
            "dude" => Ok(Preset::Dude),
            "jailbreak" => Ok(Preset::JailBreak),
            "mongo" => Ok(Preset::Mongo),
            other => Err(PersonaError::InvalidInput(format!("unknown preset: {other}"))),
        }
    }
}
