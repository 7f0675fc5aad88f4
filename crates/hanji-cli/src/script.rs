//! Editor session scripts.
//!
//! A script is a KDL document, one command per node:
//!
//! ```kdl
//! type "hello"
//! compose "안" "안녕"
//! enter shift=true
//! caret 5
//! image "photo.png" "logo.gif"
//! format "bold" from=0 to=5
//! wait 60
//! ```

use std::path::PathBuf;
use std::time::Duration;

use hanji_editor_core::{Align, FormatCommand};
use kdl::{KdlDocument, KdlNode, KdlValue};
use miette::Diagnostic;
use thiserror::Error;

use crate::kdl_error::parse_kdl;

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ScriptError {
    #[error("unknown command `{name}` (command {index})")]
    #[diagnostic(
        code(hanji::script::unknown),
        help(
            "commands: type, caret, select, delete, compose, compose-start, compose-update, \
             compose-end, enter, escape, blur, image, video, link, format, wait"
        )
    )]
    UnknownCommand { name: String, index: usize },

    #[error("`{command}` (command {index}): {reason}")]
    #[diagnostic(code(hanji::script::argument))]
    BadArgument {
        command: String,
        index: usize,
        reason: String,
    },
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Type text at the caret.
    Type(String),
    Caret(usize),
    Select { anchor: usize, head: usize },
    Delete { from: usize, to: usize },
    /// Full composition: each update in turn, then commit the last one.
    Compose(Vec<String>),
    CompositionStart,
    CompositionUpdate(String),
    /// End composition, committing the text if given.
    CompositionEnd(Option<String>),
    Enter { shift: bool, offset: Option<usize> },
    Escape,
    Blur,
    Images(Vec<PathBuf>),
    Video(String),
    Link { text: String, href: String },
    Format {
        command: FormatCommand,
        from: Option<usize>,
        to: Option<usize>,
    },
    Wait(Duration),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Type(_) => "type",
            Command::Caret(_) => "caret",
            Command::Select { .. } => "select",
            Command::Delete { .. } => "delete",
            Command::Compose(_) => "compose",
            Command::CompositionStart => "compose-start",
            Command::CompositionUpdate(_) => "compose-update",
            Command::CompositionEnd(_) => "compose-end",
            Command::Enter { .. } => "enter",
            Command::Escape => "escape",
            Command::Blur => "blur",
            Command::Images(_) => "image",
            Command::Video(_) => "video",
            Command::Link { .. } => "link",
            Command::Format { .. } => "format",
            Command::Wait(_) => "wait",
        }
    }
}

pub fn parse_script(source: &str) -> miette::Result<Vec<Command>> {
    let doc = parse_kdl(source)?;
    Ok(commands_from_kdl(&doc)?)
}

pub fn commands_from_kdl(doc: &KdlDocument) -> Result<Vec<Command>, ScriptError> {
    doc.nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| NodeArgs { node, index }.command())
        .collect()
}

/// Argument access for one node, with errors naming the node.
struct NodeArgs<'a> {
    node: &'a KdlNode,
    index: usize,
}

impl<'a> NodeArgs<'a> {
    fn name(&self) -> &'a str {
        self.node.name().value()
    }

    fn error(&self, reason: impl Into<String>) -> ScriptError {
        ScriptError::BadArgument {
            command: self.name().to_string(),
            index: self.index,
            reason: reason.into(),
        }
    }

    fn positional(&self) -> impl Iterator<Item = &'a KdlValue> {
        self.node
            .entries()
            .iter()
            .filter(|e| e.name().is_none())
            .map(|e| e.value())
    }

    fn property(&self, key: &str) -> Option<&'a KdlValue> {
        self.node
            .entries()
            .iter()
            .find(|e| e.name().is_some_and(|n| n.value() == key))
            .map(|e| e.value())
    }

    fn strings(&self) -> Result<Vec<String>, ScriptError> {
        self.positional()
            .map(|v| {
                v.as_string()
                    .map(str::to_string)
                    .ok_or_else(|| self.error("expected string arguments"))
            })
            .collect()
    }

    fn string(&self, position: usize) -> Result<String, ScriptError> {
        self.positional()
            .nth(position)
            .and_then(KdlValue::as_string)
            .map(str::to_string)
            .ok_or_else(|| self.error(format!("missing string argument {}", position + 1)))
    }

    fn offset(&self, position: usize) -> Result<usize, ScriptError> {
        self.positional()
            .nth(position)
            .and_then(as_offset)
            .ok_or_else(|| self.error(format!("missing offset argument {}", position + 1)))
    }

    fn offset_property(&self, key: &str) -> Result<Option<usize>, ScriptError> {
        self.property(key)
            .map(|v| as_offset(v).ok_or_else(|| self.error(format!("`{key}` must be an offset"))))
            .transpose()
    }

    fn command(&self) -> Result<Command, ScriptError> {
        let command = match self.name() {
            "type" => Command::Type(self.string(0)?),
            "caret" => Command::Caret(self.offset(0)?),
            "select" => Command::Select {
                anchor: self.offset(0)?,
                head: self.offset(1)?,
            },
            "delete" => Command::Delete {
                from: self.offset(0)?,
                to: self.offset(1)?,
            },
            "compose" => {
                let steps = self.strings()?;
                if steps.is_empty() {
                    return Err(self.error("needs at least one composition step"));
                }
                Command::Compose(steps)
            }
            "compose-start" => Command::CompositionStart,
            "compose-update" => Command::CompositionUpdate(self.string(0)?),
            "compose-end" => Command::CompositionEnd(self.positional().next().and_then(|v| {
                v.as_string().map(str::to_string)
            })),
            "enter" => Command::Enter {
                shift: self
                    .property("shift")
                    .and_then(KdlValue::as_bool)
                    .unwrap_or(false),
                offset: self.offset_property("offset")?,
            },
            "escape" => Command::Escape,
            "blur" => Command::Blur,
            "image" => {
                let paths = self.strings()?;
                Command::Images(paths.into_iter().map(PathBuf::from).collect())
            }
            "video" => Command::Video(self.string(0)?),
            "link" => Command::Link {
                text: self.string(0)?,
                href: self.string(1)?,
            },
            "format" => Command::Format {
                command: self.format_command()?,
                from: self.offset_property("from")?,
                to: self.offset_property("to")?,
            },
            "wait" => Command::Wait(Duration::from_millis(self.offset(0)? as u64)),
            name => {
                return Err(ScriptError::UnknownCommand {
                    name: name.to_string(),
                    index: self.index,
                });
            }
        };
        Ok(command)
    }

    fn format_command(&self) -> Result<FormatCommand, ScriptError> {
        let kind = self.string(0)?;
        let arg = self.positional().nth(1);
        let text_arg = || arg.and_then(KdlValue::as_string).map(Into::into);

        let command = match kind.as_str() {
            "bold" => FormatCommand::ToggleBold,
            "italic" => FormatCommand::ToggleItalic,
            "underline" => FormatCommand::ToggleUnderline,
            "strike" => FormatCommand::ToggleStrike,
            "header" => FormatCommand::Header(
                arg.and_then(KdlValue::as_i64)
                    .and_then(|l| u8::try_from(l).ok()),
            ),
            "color" => FormatCommand::Color(text_arg()),
            "background" => FormatCommand::Background(text_arg()),
            "align" => FormatCommand::Align(match arg.and_then(KdlValue::as_string) {
                None | Some("left") => None,
                Some("center") => Some(Align::Center),
                Some("right") => Some(Align::Right),
                Some("justify") => Some(Align::Justify),
                Some(other) => return Err(self.error(format!("unknown alignment `{other}`"))),
            }),
            "link" => FormatCommand::Link(arg.and_then(KdlValue::as_string).map(str::to_string)),
            other => return Err(self.error(format!("unknown format `{other}`"))),
        };
        Ok(command)
    }
}

fn as_offset(value: &KdlValue) -> Option<usize> {
    value.as_i64().and_then(|n| usize::try_from(n).ok())
}
