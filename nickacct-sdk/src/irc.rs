//! IRC message parsing and serialization.
//!
//! Implements the RFC 2812 line format with IRCv3 message tags:
//!   [`@`tags SPACE] [`:`prefix SPACE] command [SPACE params] [SPACE `:` trailing]
//!
//! Lines are terminated by CR-LF on the wire; parsing tolerates the
//! terminator being present or already stripped.

use std::collections::HashMap;
use std::fmt;

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// IRCv3 message tags (empty if none).
    pub tags: HashMap<String, String>,
    /// Optional prefix (server name or `nick!user@host`).
    pub prefix: Option<String>,
    /// The command, uppercased (e.g. `PRIVMSG`, `001`, `NICK`).
    pub command: String,
    /// Parameters; the last one may have been a trailing param (with spaces).
    pub params: Vec<String>,
}

/// Errors that can occur during message parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("tags or prefix present but missing command")]
    MissingCommand,
}

impl Message {
    /// Build a message with no tags or prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            tags: HashMap::new(),
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    /// Parse a single IRC line.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped.split_once(' ').ok_or(ParseError::MissingCommand)?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
                tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, after) = stripped.split_once(' ').ok_or(ParseError::MissingCommand)?;
            prefix = Some(p.to_string());
            rest = after.trim_start_matches(' ');
        }

        let (command, mut param_str) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        let mut params = Vec::new();
        loop {
            param_str = param_str.trim_start_matches(' ');
            if param_str.is_empty() {
                break;
            }
            if let Some(trailing) = param_str.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match param_str.split_once(' ') {
                Some((param, remaining)) => {
                    params.push(param.to_string());
                    param_str = remaining;
                }
                None => {
                    params.push(param_str.to_string());
                    break;
                }
            }
        }

        Ok(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// The nick portion of the prefix, if any.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .filter(|n| !n.is_empty())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();
            f.write_str("@")?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                let value = &self.tags[key];
                if value.is_empty() {
                    write!(f, "{key}")?;
                } else {
                    write!(f, "{key}={}", escape_tag_value(value))?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}

/// A message source split into its `nick!user@host` parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prefix {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    /// Split a raw prefix. Server names end up in `nick` with no user or host.
    pub fn parse(raw: &str) -> Self {
        let (rest, host) = match raw.split_once('@') {
            Some((r, h)) => (r, Some(h.to_string())),
            None => (raw, None),
        };
        let (nick, user) = match rest.split_once('!') {
            Some((n, u)) => (n.to_string(), Some(u.to_string())),
            None => (rest.to_string(), None),
        };
        Self { nick, user, host }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)?;
        if let Some(ref user) = self.user {
            write!(f, "!{user}")?;
        }
        if let Some(ref host) = self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

fn unescape_tag_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            // Trailing lone backslash is dropped
            None => {}
        }
    }
    out
}

fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_notice_with_prefix_and_trailing() {
        let msg = Message::parse(
            ":NickServ!NickServ@services.example.net NOTICE bot :alice -> alice ACC 3\r\n",
        )
        .unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("NickServ!NickServ@services.example.net"));
        assert_eq!(msg.command, "NOTICE");
        assert_eq!(msg.params, vec!["bot", "alice -> alice ACC 3"]);
        assert_eq!(msg.source_nick(), Some("NickServ"));
    }

    #[test]
    fn parse_without_prefix() {
        let msg = Message::parse("PING :irc.example.net").unwrap();
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["irc.example.net"]);
    }

    #[test]
    fn parse_kick_middle_params() {
        let msg = Message::parse(":op!o@h KICK #chan victim :bye now").unwrap();
        assert_eq!(msg.params, vec!["#chan", "victim", "bye now"]);
    }

    #[test]
    fn parse_tags() {
        let msg = Message::parse("@msgid=abc;+draft/reply=x\\sy;flag :a!b@c PRIVMSG #c :hi").unwrap();
        assert_eq!(msg.tags.get("msgid").map(String::as_str), Some("abc"));
        assert_eq!(msg.tags.get("+draft/reply").map(String::as_str), Some("x y"));
        assert_eq!(msg.tags.get("flag").map(String::as_str), Some(""));
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn parse_lowercase_command_is_normalized() {
        let msg = Message::parse("privmsg #c :x").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn parse_empty_trailing() {
        let msg = Message::parse(":a!b@c QUIT :").unwrap();
        assert_eq!(msg.params, vec![""]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Message::parse(""), Err(ParseError::Empty));
        assert_eq!(Message::parse("\r\n"), Err(ParseError::Empty));
        assert_eq!(Message::parse(":prefixonly"), Err(ParseError::MissingCommand));
        assert_eq!(Message::parse("@a=b"), Err(ParseError::MissingCommand));
    }

    #[test]
    fn display_adds_colon_only_when_needed() {
        let msg = Message::new("PRIVMSG", vec!["NickServ".into(), "ACC alice *".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG NickServ :ACC alice *");

        let msg = Message::new("JOIN", vec!["#chan".into()]);
        assert_eq!(msg.to_string(), "JOIN #chan");
    }

    #[test]
    fn display_escapes_tags() {
        let mut msg = Message::new("TAGMSG", vec!["#c".into()]);
        msg.tags.insert("+note".into(), "a b;c".into());
        assert_eq!(msg.to_string(), "@+note=a\\sb\\:c TAGMSG #c");
    }

    #[test]
    fn prefix_parts() {
        let p = Prefix::parse("alice!al@host.example");
        assert_eq!(p.nick, "alice");
        assert_eq!(p.user.as_deref(), Some("al"));
        assert_eq!(p.host.as_deref(), Some("host.example"));
        assert_eq!(p.to_string(), "alice!al@host.example");

        let p = Prefix::parse("irc.example.net");
        assert_eq!(p.nick, "irc.example.net");
        assert!(p.user.is_none() && p.host.is_none());

        let p = Prefix::parse("NickServ@services.example.net");
        assert_eq!(p.nick, "NickServ");
        assert_eq!(p.host.as_deref(), Some("services.example.net"));
    }
}
