//! Parsing and validation of the custom patch format into a list of file
//! operations. (This module does not check that the operations can actually
//! be applied to the filesystem.)
//!
//! The grammar, informally:
//!
//! start: "*** Begin Patch" LF op+ "*** End Patch" LF?
//!
//! op: add_op | delete_op | update_op
//! add_op: "*** Add File: " filename LF ("+" line LF)+
//! delete_op: "*** Delete File: " filename LF
//! update_op: "*** Update File: " filename LF move? (chunks | replacement)
//! move: "*** Move to: " filename LF
//! chunks: (chunk_header chunk_line+)+ eof_line?
//! chunk_header: ("@@" | "@@ " context) LF
//! chunk_line: ("+" | "-" | " ") line LF
//! eof_line: "*** End of File" LF
//!
//! An update body that contains no "@@" header at all is a whole-file
//! replacement: its lines (leading "+" stripped when present) become the new
//! file contents.
//!
//! The parser is slightly more lenient than the grammar and tolerates
//! whitespace padding around the directive markers.

use std::path::PathBuf;

use thiserror::Error;

const BEGIN_PATCH_MARKER: &str = "*** Begin Patch";
const END_PATCH_MARKER: &str = "*** End Patch";
const ADD_FILE_MARKER: &str = "*** Add File: ";
const DELETE_FILE_MARKER: &str = "*** Delete File: ";
const UPDATE_FILE_MARKER: &str = "*** Update File: ";
const MOVE_TO_MARKER: &str = "*** Move to: ";
const EOF_MARKER: &str = "*** End of File";
const CHANGE_CONTEXT_MARKER: &str = "@@ ";
const EMPTY_CHANGE_CONTEXT_MARKER: &str = "@@";

#[derive(Debug, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("invalid patch directive at line {line_number}: {message}")]
    InvalidDirective { message: String, line_number: usize },
}
use ParseError::*;

/// One file operation of a parsed patch.
#[derive(Debug, PartialEq)]
pub enum PatchOp {
    Add {
        path: PathBuf,
        contents: String,
    },
    Delete {
        path: PathBuf,
    },
    Update {
        path: PathBuf,
        move_path: Option<PathBuf>,
        edit: UpdateEdit,
    },
}

/// Body of an update operation: ordered hunks, or a whole-file replacement
/// when the body carried no `@@` header.
#[derive(Debug, PartialEq)]
pub enum UpdateEdit {
    Hunks(Vec<UpdateHunk>),
    Replace(String),
}

#[derive(Debug, PartialEq)]
pub struct UpdateHunk {
    /// A single line of surrounding context used to anchor the hunk (usually
    /// a class, method, or function definition).
    pub context: Option<String>,

    /// Contiguous block of lines to be replaced by `new_lines`. Must occur
    /// strictly after `context`.
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,

    /// When true, `old_lines` must occur at the end of the source file.
    pub is_end_of_file: bool,
}

pub fn parse_patch(patch: &str) -> Result<Vec<PatchOp>, ParseError> {
    let lines: Vec<&str> = patch.trim().lines().collect();
    if lines.first() != Some(&BEGIN_PATCH_MARKER) {
        return Err(InvalidPatch(String::from(
            "the first line of the patch must be '*** Begin Patch'",
        )));
    }
    let last = lines.len() - 1;
    if lines[last] != END_PATCH_MARKER {
        return Err(InvalidPatch(String::from(
            "the last line of the patch must be '*** End Patch'",
        )));
    }
    let mut ops: Vec<PatchOp> = Vec::new();
    let mut remaining = &lines[1..last];
    let mut line_number = 2;
    while !remaining.is_empty() {
        let (op, consumed) = parse_one_op(remaining, line_number)?;
        ops.push(op);
        line_number += consumed;
        remaining = &remaining[consumed..];
    }
    Ok(ops)
}

/// Parses a single file operation from the start of `lines`, returning the
/// operation and the number of lines consumed.
fn parse_one_op(lines: &[&str], line_number: usize) -> Result<(PatchOp, usize), ParseError> {
    let first_line = lines[0].trim();
    if let Some(path) = first_line.strip_prefix(ADD_FILE_MARKER) {
        let mut contents = String::new();
        let mut consumed = 1;
        for added in &lines[1..] {
            if let Some(line) = added.strip_prefix('+') {
                contents.push_str(line);
                contents.push('\n');
                consumed += 1;
            } else {
                break;
            }
        }
        return Ok((
            PatchOp::Add {
                path: PathBuf::from(path),
                contents,
            },
            consumed,
        ));
    }
    if let Some(path) = first_line.strip_prefix(DELETE_FILE_MARKER) {
        return Ok((
            PatchOp::Delete {
                path: PathBuf::from(path),
            },
            1,
        ));
    }
    if let Some(path) = first_line.strip_prefix(UPDATE_FILE_MARKER) {
        let mut remaining = &lines[1..];
        let mut consumed = 1;

        let move_path = remaining
            .first()
            .and_then(|line| line.strip_prefix(MOVE_TO_MARKER));
        if move_path.is_some() {
            remaining = &remaining[1..];
            consumed += 1;
        }

        let body_len = remaining
            .iter()
            .take_while(|line| !is_directive(**line))
            .count();
        let has_chunk_header = remaining[..body_len]
            .iter()
            .any(|line| line.starts_with(EMPTY_CHANGE_CONTEXT_MARKER));

        let (edit, body_consumed) = if has_chunk_header {
            parse_hunks(remaining, line_number + consumed)?
        } else {
            parse_replacement(&remaining[..body_len])
        };

        if matches!(&edit, UpdateEdit::Hunks(hunks) if hunks.is_empty()) {
            return Err(InvalidDirective {
                message: format!("update for path '{path}' has an empty body"),
                line_number,
            });
        }
        if matches!(&edit, UpdateEdit::Replace(contents) if contents.is_empty()) {
            return Err(InvalidDirective {
                message: format!("update for path '{path}' has an empty body"),
                line_number,
            });
        }

        return Ok((
            PatchOp::Update {
                path: PathBuf::from(path),
                move_path: move_path.map(PathBuf::from),
                edit,
            },
            consumed + body_consumed,
        ));
    }

    Err(InvalidDirective {
        message: format!(
            "'{first_line}' is not a valid directive. Valid directives: '*** Add File: {{path}}', '*** Delete File: {{path}}', '*** Update File: {{path}}'"
        ),
        line_number,
    })
}

/// A directive line terminates the body of an update. `*** End of File` is
/// not a terminator: it belongs to the chunk it follows.
fn is_directive(line: &str) -> bool {
    line.starts_with("***") && line.trim() != EOF_MARKER
}

fn parse_replacement(body: &[&str]) -> (UpdateEdit, usize) {
    let mut contents = String::new();
    let mut consumed = 0;
    for line in body.iter().copied() {
        if line.trim() == EOF_MARKER {
            consumed += 1;
            break;
        }
        contents.push_str(line.strip_prefix('+').unwrap_or(line));
        contents.push('\n');
        consumed += 1;
    }
    (UpdateEdit::Replace(contents), consumed)
}

fn parse_hunks(lines: &[&str], line_number: usize) -> Result<(UpdateEdit, usize), ParseError> {
    let mut hunks = Vec::new();
    let mut remaining = lines;
    let mut consumed = 0;
    while !remaining.is_empty() {
        // Skip blank separator lines between hunks.
        if remaining[0].trim().is_empty() {
            consumed += 1;
            remaining = &remaining[1..];
            continue;
        }
        if is_directive(remaining[0]) {
            break;
        }
        let (hunk, hunk_lines) = parse_one_hunk(remaining, line_number + consumed)?;
        hunks.push(hunk);
        consumed += hunk_lines;
        remaining = &remaining[hunk_lines..];
    }
    Ok((UpdateEdit::Hunks(hunks), consumed))
}

fn parse_one_hunk(lines: &[&str], line_number: usize) -> Result<(UpdateHunk, usize), ParseError> {
    let context = if lines[0] == EMPTY_CHANGE_CONTEXT_MARKER {
        None
    } else if let Some(context) = lines[0].strip_prefix(CHANGE_CONTEXT_MARKER) {
        Some(context.to_string())
    } else {
        return Err(InvalidDirective {
            message: format!("expected hunk to start with a @@ header, got: '{}'", lines[0]),
            line_number,
        });
    };
    if lines.len() < 2 {
        return Err(InvalidDirective {
            message: "hunk does not contain any lines".to_string(),
            line_number: line_number + 1,
        });
    }
    let mut hunk = UpdateHunk {
        context,
        old_lines: Vec::new(),
        new_lines: Vec::new(),
        is_end_of_file: false,
    };
    let mut parsed_lines = 0;
    for line in &lines[1..] {
        match *line {
            EOF_MARKER => {
                if parsed_lines == 0 {
                    return Err(InvalidDirective {
                        message: "hunk does not contain any lines".to_string(),
                        line_number: line_number + 1,
                    });
                }
                hunk.is_end_of_file = true;
                parsed_lines += 1;
                break;
            }
            contents => {
                match contents.chars().next() {
                    None => {
                        // A fully blank line counts as empty context.
                        hunk.old_lines.push(String::new());
                        hunk.new_lines.push(String::new());
                    }
                    Some(' ') => {
                        hunk.old_lines.push(contents[1..].to_string());
                        hunk.new_lines.push(contents[1..].to_string());
                    }
                    Some('+') => {
                        hunk.new_lines.push(contents[1..].to_string());
                    }
                    Some('-') => {
                        hunk.old_lines.push(contents[1..].to_string());
                    }
                    _ => {
                        if parsed_lines == 0 {
                            return Err(InvalidDirective {
                                message: format!(
                                    "unexpected line in hunk: '{contents}'. Every line should start with ' ' (context), '+' (added), or '-' (removed)"
                                ),
                                line_number: line_number + 1,
                            });
                        }
                        // Start of the next hunk or directive.
                        break;
                    }
                }
                parsed_lines += 1;
            }
        }
    }

    Ok((hunk, parsed_lines + 1))
}
