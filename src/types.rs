use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set when the stream feeding this message was cancelled. Never sent to the server.
    #[serde(skip)]
    pub truncated: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            truncated: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            truncated: false,
        }
    }
}

/// Answer languages the chat endpoint accepts, sent verbatim by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Bengali,
    Tamil,
    Telugu,
    Marathi,
    Gujarati,
    Kannada,
    Malayalam,
    Punjabi,
    Odia,
    Urdu,
}

impl Language {
    pub const ALL: [Language; 12] = [
        Language::English,
        Language::Hindi,
        Language::Bengali,
        Language::Tamil,
        Language::Telugu,
        Language::Marathi,
        Language::Gujarati,
        Language::Kannada,
        Language::Malayalam,
        Language::Punjabi,
        Language::Odia,
        Language::Urdu,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Bengali => "Bengali",
            Language::Tamil => "Tamil",
            Language::Telugu => "Telugu",
            Language::Marathi => "Marathi",
            Language::Gujarati => "Gujarati",
            Language::Kannada => "Kannada",
            Language::Malayalam => "Malayalam",
            Language::Punjabi => "Punjabi",
            Language::Odia => "Odia",
            Language::Urdu => "Urdu",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported language: {}", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLanguage(wanted.to_string()))
    }
}

/// Body of `POST <base>/chat`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub language: Language,
    pub history: Vec<ChatMessage>,
}

/// Body returned by the non-streaming form of the chat endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub language: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = ChatRequest {
            prompt: "What is Section 420 of IPC?".into(),
            language: Language::Hindi,
            history: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "prompt": "What is Section 420 of IPC?",
                "language": "Hindi",
                "history": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            })
        );
    }

    #[test]
    fn truncated_flag_stays_local() {
        let mut msg = ChatMessage::assistant("partial");
        msg.truncated = true;
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("truncated").is_none());
    }

    #[test]
    fn parses_languages_case_insensitively() {
        assert_eq!("odia".parse::<Language>(), Ok(Language::Odia));
        assert_eq!(" MALAYALAM ".parse::<Language>(), Ok(Language::Malayalam));
        assert!("Klingon".parse::<Language>().is_err());
        assert_eq!(Language::ALL.len(), 12);
    }

    #[test]
    fn response_sources_are_optional() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"answer":"ok","language":"English"}"#).unwrap();
        assert_eq!(parsed.sources, None);
    }
}
