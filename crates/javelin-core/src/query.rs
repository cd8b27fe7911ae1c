//! Parsing of `project/config1:config2:key input...` command strings.
//!
//! ```text
//! query       := command (';' command)*
//! command     := scoped-task input*
//! scoped-task := (project '/')? (config ':')* key
//! input       := (name '=')? text
//! ```
//!
//! `/`, `:`, `=`, `;`, and whitespace may be backslash-escaped anywhere;
//! double-quoted strings take everything literally except `\"` and `\\`.
//! Within the task word, `/` and `:` are structural; within an input word
//! only the first unescaped `=` is.

use std::fmt;

use javelin_util::errors::JavelinError;

/// A parsed query: one or more commands executed left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub commands: Vec<Command>,
}

/// One command: a scoped task plus its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub task: ScopedTask,
    pub inputs: Vec<QueryInput>,
}

/// The `project/config1:config2:key` part of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedTask {
    pub project: Option<String>,
    pub configurations: Vec<String>,
    pub key: String,
}

/// A user input attached to a command, named or free (positional).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInput {
    pub key: Option<String>,
    pub value: String,
}

impl Query {
    pub fn parse(input: &str) -> miette::Result<Self> {
        let mut chars = input.chars().peekable();
        let mut commands = Vec::new();

        loop {
            skip_whitespace(&mut chars);
            match chars.peek() {
                None => break,
                Some(';') => {
                    chars.next();
                    continue;
                }
                Some(_) => commands.push(parse_command(&mut chars)?),
            }
        }

        if commands.is_empty() {
            return Err(JavelinError::Query {
                message: "empty query".to_string(),
            }
            .into());
        }
        Ok(Self { commands })
    }
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// One piece of a word, with the structural separator that followed it
/// (`None` for the final piece).
struct Segment {
    text: String,
    sep: Option<char>,
}

fn parse_command(chars: &mut Chars) -> miette::Result<Command> {
    let task = parse_scoped_task(chars)?;

    let mut inputs = Vec::new();
    loop {
        skip_whitespace(chars);
        match chars.peek() {
            None => break,
            Some(';') => {
                chars.next();
                break;
            }
            Some(_) => inputs.push(parse_input(chars)?),
        }
    }

    Ok(Command { task, inputs })
}

fn parse_scoped_task(chars: &mut Chars) -> miette::Result<ScopedTask> {
    let segments = scan_word(chars, &['/', ':', '='])?;

    let mut project = None;
    let mut configurations = Vec::new();
    let mut key = None;

    for (i, seg) in segments.iter().enumerate() {
        if seg.text.is_empty() {
            return Err(query_error("empty identifier in task"));
        }
        match seg.sep {
            Some('/') => {
                if i != 0 || project.is_some() {
                    return Err(query_error("'/' is only allowed after the project name"));
                }
                project = Some(seg.text.clone());
            }
            Some(':') => configurations.push(seg.text.clone()),
            Some('=') => {
                return Err(query_error("unexpected '=' in task; inputs follow the key"));
            }
            Some(_) => unreachable!("scan_word only yields requested separators"),
            None => key = Some(seg.text.clone()),
        }
    }

    match key {
        Some(key) => Ok(ScopedTask {
            project,
            configurations,
            key,
        }),
        None => Err(query_error("missing key name")),
    }
}

fn parse_input(chars: &mut Chars) -> miette::Result<QueryInput> {
    let segments = scan_word(chars, &['='])?;

    if segments.len() == 1 {
        return Ok(QueryInput {
            key: None,
            value: segments[0].text.clone(),
        });
    }

    // Only the first '=' is structural; later ones stay in the value.
    let key = segments[0].text.clone();
    if key.is_empty() {
        return Err(query_error("empty input name before '='"));
    }
    let value = segments[1..]
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("=");
    Ok(QueryInput {
        key: Some(key),
        value,
    })
}

/// Scan one word, splitting on the given structural separators.
///
/// Terminates (without consuming) on unescaped whitespace or `;`.
fn scan_word(chars: &mut Chars, separators: &[char]) -> miette::Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();

    loop {
        match chars.peek().copied() {
            None | Some(';') => break,
            Some(c) if c.is_whitespace() => break,
            Some('\\') => {
                chars.next();
                match chars.next() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(query_error("dangling backslash")),
                }
            }
            Some('"') => {
                chars.next();
                scan_quoted(chars, &mut text)?;
            }
            Some(c) if separators.contains(&c) => {
                chars.next();
                segments.push(Segment {
                    text: std::mem::take(&mut text),
                    sep: Some(c),
                });
            }
            Some(c) => {
                chars.next();
                text.push(c);
            }
        }
    }

    segments.push(Segment { text, sep: None });
    Ok(segments)
}

/// Consume a double-quoted run; the opening quote is already consumed.
fn scan_quoted(chars: &mut Chars, out: &mut String) -> miette::Result<()> {
    loop {
        match chars.next() {
            None => return Err(query_error("unterminated quoted string")),
            Some('"') => return Ok(()),
            Some('\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => return Err(query_error("unterminated quoted string")),
            },
            Some(c) => out.push(c),
        }
    }
}

fn skip_whitespace(chars: &mut Chars) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn query_error(message: &str) -> miette::Report {
    JavelinError::Query {
        message: message.to_string(),
    }
    .into()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '/' | ':' | '=' | ';' | '"' | '\\') || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for ScopedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref project) = self.project {
            write!(f, "{}/", escape(project))?;
        }
        for config in &self.configurations {
            write!(f, "{}:", escape(config))?;
        }
        f.write_str(&escape(&self.key))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.task)?;
        for input in &self.inputs {
            f.write_str(" ")?;
            if let Some(ref key) = input.key {
                write!(f, "{}=", escape(key))?;
            }
            f.write_str(&escape(&input.value))?;
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{command}")?;
        }
        Ok(())
    }
}
