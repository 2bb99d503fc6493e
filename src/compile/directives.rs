//! Embedded rich blocks.
//!
//! Bodies may contain container blocks delimited by `:::` lines:
//!
//! ```text
//! :::callout type=warning title="Heads up"
//! Markdown content, **compiled** like the rest of the body.
//! :::
//!
//! :::youtube id=dQw4w9WgXcQ :::          # opener and closer on one line
//!
//! :::figure src=/img/desk.jpg alt="My desk"
//! Optional *caption*.
//! :::
//! ```
//!
//! Blocks nest. `:::` lines inside fenced code are ordinary text. Every block
//! compiles to static markup; nothing here needs a runtime.
//!
//! Unknown block types, types not enabled in `markup.extensions`, unknown or
//! invalid attributes, stray closers and unclosed blocks are compile errors.

use super::CompileError;
use maud::{Markup, PreEscaped, html};
use std::collections::{BTreeMap, BTreeSet};

/// Every block type the compiler knows how to render.
pub const BUILTIN_BLOCKS: &[&str] = &["callout", "youtube", "figure"];

const CALLOUT_KINDS: &[&str] = &["note", "tip", "warning"];

/// A body split into markdown runs and embedded blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Markdown(String),
    Directive(Directive),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Block>,
    /// 1-based line of the opening `:::` within the body.
    pub line: usize,
    pub snippet: String,
    /// Opener and closer on the same line.
    pub self_closing: bool,
}

impl Directive {
    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(self.line, &self.snippet, message)
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn check_attrs(&self, allowed: &[&str]) -> Result<(), CompileError> {
        match self.attrs.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(unknown) => Err(self.error(format!(
                "unknown attribute `{unknown}` for `{}` block (allowed: {})",
                self.name,
                allowed.join(", ")
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn has_content(&self) -> bool {
        self.children.iter().any(|child| match child {
            Block::Markdown(text) => !text.trim().is_empty(),
            Block::Directive(_) => true,
        })
    }
}

struct Frame {
    header: Option<Directive>,
    blocks: Vec<Block>,
    markdown: String,
}

impl Frame {
    fn new(header: Option<Directive>) -> Self {
        Self {
            header,
            blocks: Vec::new(),
            markdown: String::new(),
        }
    }

    fn flush(&mut self) {
        if !self.markdown.is_empty() {
            self.blocks
                .push(Block::Markdown(std::mem::take(&mut self.markdown)));
        }
    }

    fn close(mut self) -> Option<Directive> {
        self.flush();
        let mut directive = self.header?;
        directive.children = self.blocks;
        Some(directive)
    }
}

/// Split `raw` into markdown runs and (possibly nested) blocks.
pub fn parse(raw: &str, enabled: &BTreeSet<String>) -> Result<Vec<Block>, CompileError> {
    let mut root = Frame::new(None);
    let mut open: Vec<Frame> = Vec::new();
    let mut fence: Option<(char, usize)> = None;

    for (index, line) in raw.split_inclusive('\n').enumerate() {
        let line_no = index + 1;
        let content = line.trim_end_matches(['\n', '\r']);

        if let Some(marker) = fence {
            if fence_closes(content, marker) {
                fence = None;
            }
            current(&mut root, &mut open).markdown.push_str(line);
            continue;
        }
        if let Some(marker) = fence_opens(content) {
            fence = Some(marker);
            current(&mut root, &mut open).markdown.push_str(line);
            continue;
        }

        let Some(rest) = directive_line(content).and_then(|l| l.strip_prefix(":::")) else {
            current(&mut root, &mut open).markdown.push_str(line);
            continue;
        };
        let trimmed = content.trim();

        if rest.trim().is_empty() {
            if open.is_empty() {
                return Err(CompileError::new(
                    line_no,
                    trimmed,
                    "closing `:::` without an open block",
                ));
            }
            close_innermost(&mut root, &mut open);
            continue;
        }

        let directive = parse_header(rest, line_no, trimmed)?;
        if !BUILTIN_BLOCKS.contains(&directive.name.as_str()) {
            return Err(directive.error(format!("unknown block type `{}`", directive.name)));
        }
        if !enabled.contains(&directive.name) {
            return Err(directive.error(format!(
                "block type `{}` is not enabled in markup.extensions",
                directive.name
            )));
        }

        let self_closing = directive.self_closing;
        current(&mut root, &mut open).flush();
        open.push(Frame::new(Some(directive)));
        if self_closing {
            close_innermost(&mut root, &mut open);
        }
    }

    if let Some(directive) = open.pop().and_then(|frame| frame.header) {
        return Err(directive.error(format!(
            "`{}` block is never closed (missing `:::`)",
            directive.name
        )));
    }

    root.flush();
    Ok(root.blocks)
}

fn current<'a>(root: &'a mut Frame, open: &'a mut [Frame]) -> &'a mut Frame {
    match open.last_mut() {
        Some(frame) => frame,
        None => root,
    }
}

fn close_innermost(root: &mut Frame, open: &mut Vec<Frame>) {
    if let Some(frame) = open.pop()
        && let Some(directive) = frame.close()
    {
        current(root, open).blocks.push(Block::Directive(directive));
    }
}

fn parse_header(rest: &str, line: usize, snippet: &str) -> Result<Directive, CompileError> {
    let rest = rest.trim();
    let (name, attr_text) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    let (attr_text, self_closing) = match attr_text.strip_suffix(":::") {
        Some(stripped) => (stripped.trim_end(), true),
        None => (attr_text, false),
    };
    let attrs = parse_attrs(attr_text).map_err(|msg| CompileError::new(line, snippet, msg))?;

    Ok(Directive {
        name: name.to_string(),
        attrs,
        children: Vec::new(),
        line,
        snippet: snippet.to_string(),
        self_closing,
    })
}

/// Parse `key=value key2="quoted value" flag` into a map.
fn parse_attrs(input: &str) -> Result<BTreeMap<String, String>, String> {
    let mut attrs = BTreeMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        if key.is_empty() {
            return Err("expected attribute name before `=`".into());
        }

        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            if chars.next_if_eq(&'"').is_some() {
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => value.extend(chars.next()),
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(format!("unterminated quoted value for `{key}`"));
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }
        }

        if attrs.insert(key.clone(), value).is_some() {
            return Err(format!("duplicate attribute `{key}`"));
        }
    }

    Ok(attrs)
}

/// Line content after at most three spaces of indentation. Deeper lines are
/// indented code or continuation text and never delimit a block.
fn directive_line(line: &str) -> Option<&str> {
    let body = line.trim_start_matches(' ');
    if line.len() - body.len() > 3 || body.starts_with('\t') {
        return None;
    }
    Some(body.trim_end())
}

/// Opening code fence: up to three spaces, then three or more backticks or tildes.
pub(crate) fn fence_opens(line: &str) -> Option<(char, usize)> {
    let body = line.trim_start_matches(' ');
    if line.len() - body.len() > 3 {
        return None;
    }
    let marker = body.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let count = body.chars().take_while(|&c| c == marker).count();
    if count < 3 || (marker == '`' && body[count..].contains('`')) {
        return None;
    }
    Some((marker, count))
}

pub(crate) fn fence_closes(line: &str, (marker, count): (char, usize)) -> bool {
    let body = line.trim_start_matches(' ');
    if line.len() - body.len() > 3 {
        return false;
    }
    let run = body.chars().take_while(|&c| c == marker).count();
    run >= count && body[run..].trim().is_empty()
}

/// Render one block around its already-compiled children.
pub fn render(directive: &Directive, inner: &str) -> Result<Markup, CompileError> {
    match directive.name.as_str() {
        "callout" => render_callout(directive, inner),
        "youtube" => render_youtube(directive),
        "figure" => render_figure(directive, inner),
        other => Err(directive.error(format!("unknown block type `{other}`"))),
    }
}

fn render_callout(d: &Directive, inner: &str) -> Result<Markup, CompileError> {
    d.check_attrs(&["type", "title"])?;
    let kind = d.attr("type").unwrap_or("note");
    if !CALLOUT_KINDS.contains(&kind) {
        return Err(d.error(format!(
            "callout type must be one of {}, got `{kind}`",
            CALLOUT_KINDS.join(", ")
        )));
    }
    Ok(html! {
        aside class={ "callout callout-" (kind) } role="note" {
            @if let Some(title) = d.attr("title") {
                p class="callout-title" { (title) }
            }
            (PreEscaped(inner))
        }
    })
}

fn render_youtube(d: &Directive) -> Result<Markup, CompileError> {
    d.check_attrs(&["id", "title"])?;
    let id = d
        .attr("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| d.error("youtube block requires an `id` attribute"))?;
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(d.error(format!("invalid youtube video id `{id}`")));
    }
    if d.has_content() {
        return Err(d.error("youtube block takes no content"));
    }
    let title = d.attr("title").unwrap_or("YouTube video");
    Ok(html! {
        div class="embed embed-youtube" {
            iframe
                src={ "https://www.youtube-nocookie.com/embed/" (id) }
                title=(title)
                loading="lazy"
                allowfullscreen {}
        }
    })
}

fn render_figure(d: &Directive, inner: &str) -> Result<Markup, CompileError> {
    d.check_attrs(&["src", "alt"])?;
    let src = d
        .attr("src")
        .filter(|src| !src.is_empty())
        .ok_or_else(|| d.error("figure block requires a `src` attribute"))?;
    let alt = d.attr("alt").unwrap_or("");
    Ok(html! {
        figure {
            img src=(src) alt=(alt) loading="lazy";
            @if !inner.trim().is_empty() {
                figcaption { (PreEscaped(inner.trim())) }
            }
        }
    })
}
