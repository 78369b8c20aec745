use super::is_valid_name;
use super::ConfigTree;
use crate::CodecError;
use crate::Result;

struct Frame {
    name: String,
    tree: ConfigTree,
}

fn malformed(
    line: usize,
    reason: impl Into<String>,
) -> crate::Error {
    CodecError::Parse {
        line,
        reason: reason.into(),
    }
    .into()
}

/// Line oriented parser for the textual tree format.
pub(super) fn parse(text: &str) -> Result<ConfigTree> {
    let mut stack: Vec<Frame> = vec![Frame {
        name: String::new(),
        tree: ConfigTree::new(),
    }];
    // Section name waiting for its opening brace on the next line
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line == "{" {
            let Some((_, name)) = pending.take() else {
                return Err(malformed(line_no, "'{' without a section name"));
            };
            stack.push(Frame {
                name,
                tree: ConfigTree::new(),
            });
            continue;
        }

        if let Some((pending_line, name)) = pending.take() {
            return Err(malformed(
                pending_line,
                format!("expected '{{' after section name '{name}'"),
            ));
        }

        if line == "}" {
            if stack.len() == 1 {
                return Err(malformed(line_no, "unbalanced '}'"));
            }
            let Some(frame) = stack.pop() else {
                return Err(malformed(line_no, "unbalanced '}'"));
            };
            let Some(parent) = stack.last_mut().map(|f| &mut f.tree) else {
                return Err(malformed(line_no, "unbalanced '}'"));
            };
            match parent.section_mut(&frame.name) {
                Some(existing) => existing.merge_in_place(&frame.tree),
                None => {
                    parent.insert_section(&frame.name, frame.tree);
                }
            }
            continue;
        }

        // Options first: a value may itself end with '{'
        if let Some((lhs, value)) = line.split_once('=') {
            let Some(current) = stack.last_mut().map(|f| &mut f.tree) else {
                return Err(malformed(line_no, "parser lost its root section"));
            };
            let value = value.trim();
            let (name, append) = match lhs.strip_suffix('+') {
                Some(name) => (name.trim(), true),
                None => (lhs.trim(), false),
            };
            if !is_valid_name(name) {
                return Err(malformed(line_no, format!("invalid option name '{name}'")));
            }
            if append {
                current.append_option(name, value);
            } else {
                current.set_option(name, value);
            }
            continue;
        }

        let name = line.strip_suffix('{').unwrap_or(line).trim();
        if !is_valid_name(name) {
            return Err(malformed(line_no, format!("invalid section name '{name}'")));
        }
        if line.ends_with('{') {
            stack.push(Frame {
                name: name.to_string(),
                tree: ConfigTree::new(),
            });
        } else {
            pending = Some((line_no, name.to_string()));
        }
    }

    if let Some((line_no, name)) = pending {
        return Err(malformed(
            line_no,
            format!("expected '{{' after section name '{name}'"),
        ));
    }
    if stack.len() > 1 {
        let open = stack.len() - 1;
        return Err(malformed(
            text.lines().count(),
            format!("{open} section(s) left unclosed"),
        ));
    }

    Ok(stack.pop().map(|frame| frame.tree).unwrap_or_default())
}
