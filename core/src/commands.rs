//! Console command registry (§1.1 Ambient stack). Grounded in
//! `game_commands.hpp`'s `command_buffer` dispatch: commands are
//! registered under a name (possibly multi-word, e.g. `"cfg set"`), looked
//! up by longest-prefix match against the input line, and the remainder of
//! the line is split on whitespace into arguments.

use crate::error::CommandError;

pub type CommandHandler = Box<dyn FnMut(&[&str]) -> Result<String, CommandError> + Send>;

/// Flat, linear-scan command table. A handful of dozens of commands never
/// justifies a trie; this mirrors the teacher's preference for a simple
/// `Vec`-backed registry over a generalized lookup structure.
#[derive(Default)]
pub struct CommandRegistry {
    names: Vec<String>,
    handlers: Vec<CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            self.handlers[idx] = handler;
        } else {
            self.names.push(name.to_string());
            self.handlers.push(handler);
        }
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            self.names.remove(idx);
            self.handlers.remove(idx);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Dispatches one input line: finds the longest registered name that is
    /// a whitespace-aligned prefix of the line, and passes the remaining
    /// tokens as arguments.
    pub fn dispatch(&mut self, line: &str) -> Result<String, CommandError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CommandError::Unknown(String::new()));
        }

        let mut best: Option<usize> = None;
        let mut best_len = 0usize;
        for (idx, name) in self.names.iter().enumerate() {
            let name_tokens: Vec<&str> = name.split_whitespace().collect();
            if name_tokens.len() > tokens.len() || name_tokens.len() <= best_len {
                continue;
            }
            if tokens[..name_tokens.len()] == name_tokens[..] {
                best = Some(idx);
                best_len = name_tokens.len();
            }
        }

        match best {
            Some(idx) => (self.handlers[idx])(&tokens[best_len..]),
            None => Err(CommandError::Unknown(line.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn longest_prefix_wins_over_shorter_match() {
        let mut reg = CommandRegistry::new();
        reg.register("cfg", Box::new(|_args| Ok("cfg-generic".to_string())));
        reg.register("cfg set", Box::new(|_args| Ok("cfg-set".to_string())));

        assert_eq!(reg.dispatch("cfg set gravity 980").unwrap(), "cfg-set");
        assert_eq!(reg.dispatch("cfg list").unwrap(), "cfg-generic");
    }

    #[test]
    fn unknown_command_reports_the_full_line() {
        let mut reg = CommandRegistry::new();
        let err = reg.dispatch("frobnicate now").unwrap_err();
        assert!(matches!(err, CommandError::Unknown(line) if line == "frobnicate now"));
    }

    #[test]
    fn handler_receives_remaining_tokens_as_args() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let mut reg = CommandRegistry::new();
        reg.register(
            "kick_player",
            Box::new(move |args| {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(args.join(","))
            }),
        );
        let out = reg.dispatch("kick_player alice reason_afk").unwrap();
        assert_eq!(out, "alice,reason_afk");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
