use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::ChatMessage;

/// One IRCv3 line as sent by the Twitch chat server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrcLine {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcLine {
    /// Parse `[@tags] [:prefix] COMMAND [params] [:trailing]`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let mut parsed = IrcLine::default();

        if let Some(tagged) = rest.strip_prefix('@') {
            let (tags, remainder) = tagged.split_once(' ')?;
            parsed.tags = tags
                .split(';')
                .filter(|tag| !tag.is_empty())
                .map(|tag| match tag.split_once('=') {
                    Some((key, value)) => (key.to_string(), unescape_tag(value)),
                    None => (tag.to_string(), String::new()),
                })
                .collect();
            rest = remainder.trim_start();
        }

        if let Some(prefixed) = rest.strip_prefix(':') {
            let (prefix, remainder) = prefixed.split_once(' ')?;
            parsed.prefix = Some(prefix.to_string());
            rest = remainder.trim_start();
        }

        let (middle, trailing) = match rest.split_once(" :") {
            Some((middle, trailing)) => (middle, Some(trailing)),
            None => (rest, None),
        };
        let mut words = middle.split(' ').filter(|word| !word.is_empty());
        parsed.command = words.next()?.to_ascii_uppercase();
        parsed.params = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            parsed.params.push(trailing.to_string());
        }
        Some(parsed)
    }

    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Chat message carried by a `PRIVMSG`, with `/me` actions unwrapped.
    pub fn to_chat_message(&self, received_at: DateTime<Utc>) -> Option<ChatMessage> {
        if self.command != "PRIVMSG" || self.params.len() < 2 {
            return None;
        }
        let channel = self.params[0].trim_start_matches('#').to_string();
        let sender = self.tag("display-name").or_else(|| self.nick())?.to_string();
        let raw = &self.params[1];
        let text = raw
            .strip_prefix("\u{1}ACTION ")
            .and_then(|action| action.strip_suffix('\u{1}'))
            .unwrap_or(raw)
            .to_string();
        Some(ChatMessage {
            channel,
            sender,
            text,
            received_at,
        })
    }
}

fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/irc_tests.rs"]
mod tests;
