use log::warn;

const PIPE: &str = "|";
const INPUT: &str = "<";
const OUTPUT: &str = ">";
const APPEND: &str = ">>";
const BACKGROUND: &str = "&";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Truncate,
    Append,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Truncate
    }
}

/// Files a simple command's standard input and output are redirected to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirection {
    pub input: Option<String>,
    pub output: Option<String>,
    pub mode: OutputMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// `left | right`, split at the first pipe token. Operators on either side
    /// are passed through as plain arguments.
    Pipeline { left: Vec<String>, right: Vec<String> },
    Simple {
        argv: Vec<String>,
        redirection: Redirection,
        background: bool,
    },
}

/// Classifies a token sequence into a pipeline or a simple command.
pub fn scan(mut tokens: Vec<String>) -> CommandLine {
    if let Some(index) = tokens.iter().position(|token| token == PIPE) {
        let right = tokens.split_off(index + 1);
        tokens.truncate(index);

        return CommandLine::Pipeline {
            left: tokens,
            right,
        };
    }

    let mut argv = Vec::with_capacity(tokens.len());
    let mut redirection = Redirection::default();
    let mut background = false;

    let last = tokens.len().saturating_sub(1);
    let mut tokens = tokens.into_iter().enumerate();

    while let Some((index, token)) = tokens.next() {
        match token.as_str() {
            INPUT => {
                redirection.input = tokens.next().map(|(_, path)| path);
                if redirection.input.is_none() {
                    warn!("'{}' without a file name, input is not redirected", INPUT);
                }
            }
            OUTPUT | APPEND => {
                redirection.mode = if token == APPEND {
                    OutputMode::Append
                } else {
                    OutputMode::Truncate
                };
                redirection.output = tokens.next().map(|(_, path)| path);
                if redirection.output.is_none() {
                    warn!("'{}' without a file name, output is not redirected", token);
                }
            }
            BACKGROUND => {
                background = index == last;
                if !background {
                    warn!("'{}' is not the last token, ignoring the rest of the line", BACKGROUND);
                }
                break;
            }
            _ => argv.push(token),
        }
    }

    CommandLine::Simple {
        argv,
        redirection,
        background,
    }
}
