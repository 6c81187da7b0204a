use std::env;

pub const DEFAULT_PROMPT: &str = "mysh> ";

/// Line buffer size, one byte of it reserved for the terminator.
pub const MAX_LINE: usize = 80;

/// Argument slots, one of them reserved for the null sentinel.
pub const MAX_ARGS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prompt: String,
    pub max_line: usize,
    pub max_args: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: DEFAULT_PROMPT.to_owned(),
            max_line: MAX_LINE,
            max_args: MAX_ARGS,
        }
    }
}

impl Config {
    /// Defaults, with the prompt text taken from `MYSH_PROMPT` when it is set.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(prompt) = env::var("MYSH_PROMPT") {
            if !prompt.is_empty() {
                config.prompt = prompt;
            }
        }

        config
    }

    pub fn usable_line(&self) -> usize {
        self.max_line.saturating_sub(1)
    }

    pub fn usable_args(&self) -> usize {
        self.max_args.saturating_sub(1)
    }
}
