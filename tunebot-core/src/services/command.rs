/// Chat commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `play <query>`; the query may be empty and is validated later.
    Play(String),
    /// `list` (placeholder, no stored queue yet).
    List,
    /// `delete` (placeholder, no stored queue yet).
    Delete,
}

impl ChatCommand {
    /// Parses `text` if it starts with `prefix` followed by a known command word.
    pub fn parse(prefix: &str, text: &str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix(prefix)?;
        let (word, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        match word.to_ascii_lowercase().as_str() {
            "play" => Some(ChatCommand::Play(args.to_string())),
            "list" => Some(ChatCommand::List),
            "delete" => Some(ChatCommand::Delete),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatCommand::Play(_) => "play",
            ChatCommand::List => "list",
            ChatCommand::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_takes_the_rest_of_the_line() {
        assert_eq!(
            ChatCommand::parse("@", "@play  lofi hip hop  "),
            Some(ChatCommand::Play("lofi hip hop".into()))
        );
        assert_eq!(ChatCommand::parse("@", "@play"), Some(ChatCommand::Play(String::new())));
        assert_eq!(ChatCommand::parse("@", "@PLAY x"), Some(ChatCommand::Play("x".into())));
    }

    #[test]
    fn stubs_and_unknown_words() {
        assert_eq!(ChatCommand::parse("@", "@list"), Some(ChatCommand::List));
        assert_eq!(ChatCommand::parse("@", "@delete 3"), Some(ChatCommand::Delete));
        assert_eq!(ChatCommand::parse("@", "@playlist"), None);
        assert_eq!(ChatCommand::parse("@", "play lofi"), None);
        assert_eq!(ChatCommand::parse("!", "@play lofi"), None);
        assert_eq!(ChatCommand::parse("@", "hello @play lofi"), None);
    }
}
