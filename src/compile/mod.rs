//! Body compilation: raw markdown body → static HTML.
//!
//! ```text
//! raw body ──► directives::parse ──► [Markdown | Directive{children}]*
//!                                          │
//!                               flatten: each block becomes an
//!                               open/close comment marker pair
//!                                          │
//!                           one pulldown-cmark pass over the whole body
//!                           + anchors + highlight + block markup at markers
//!                                          ▼
//!                           CompiledBody { html, headings, digest }
//! ```
//!
//! ## Markdown
//!
//! CommonMark via `pulldown-cmark` with tables, footnotes, strikethrough,
//! task lists and `{#id}` heading attributes. The body is parsed once, so
//! reference links and footnotes resolve across block boundaries. The event
//! stream is rewritten on the way through:
//!
//! - **Headings** get an `id` anchor (GitHub style: lowercase, spaces and
//!   hyphens become `-`, other punctuation dropped). Repeats are suffixed
//!   `-1`, `-2`, … across the whole body, including text inside blocks. An
//!   explicit `{#id}` is kept as written and generated anchors step around
//!   it; the same explicit id twice is a compile error.
//! - **Fenced code** is replaced by the output of [`highlight::render`].
//! - **Block markers** are replaced by the block's opening and closing markup.
//!
//! ## Determinism
//!
//! Compilation reads no files, clocks or environment. The same raw body and
//! the same [`MarkupConfig`] always produce byte-identical HTML, and
//! [`CompiledBody::digest`] (SHA-256 of the HTML) identifies that output.

pub mod directives;
pub mod highlight;

use crate::config::MarkupConfig;
use directives::{Block, Directive};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use pulldown_cmark::html as md_html;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// A body that could not be compiled. `line` is 1-based within the body.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message} (`{snippet}`)")]
pub struct CompileError {
    pub line: usize,
    pub snippet: String,
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, snippet: &str, message: impl Into<String>) -> Self {
        Self {
            line,
            snippet: snippet.to_string(),
            message: message.into(),
        }
    }
}

/// A heading found in the body, in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub id: String,
}

/// Output of [`Compiler::compile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledBody {
    pub html: String,
    /// Source markdown, kept for read-time estimation.
    #[serde(skip)]
    pub raw: String,
    pub headings: Vec<Heading>,
    /// SHA-256 hex of `html`.
    pub digest: String,
}

/// Compiles markdown bodies with a fixed set of enabled block types.
#[derive(Debug, Clone)]
pub struct Compiler {
    enabled: BTreeSet<String>,
    options: Options,
}

impl Compiler {
    pub fn new(config: &MarkupConfig) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        Self {
            enabled: config.extensions.iter().cloned().collect(),
            options,
        }
    }

    pub fn compile(&self, raw: &str) -> Result<CompiledBody, CompileError> {
        let blocks = directives::parse(raw, &self.enabled)?;
        let flat = Flattened::new(raw, &blocks);
        let mut anchors = self.reserve_explicit_ids(&flat)?;
        let (html, headings) = self.render(&flat, &mut anchors)?;
        let digest = format!("{:x}", Sha256::digest(html.as_bytes()));
        Ok(CompiledBody {
            html,
            raw: raw.to_string(),
            headings,
            digest,
        })
    }

    /// Claim every `{#id}` before any anchor is generated.
    fn reserve_explicit_ids(&self, flat: &Flattened) -> Result<AnchorSet, CompileError> {
        let mut anchors = AnchorSet::default();
        let parser = Parser::new_ext(&flat.text, self.options).into_offset_iter();
        for (event, range) in parser {
            if let Event::Start(Tag::Heading { id: Some(id), .. }) = event
                && !anchors.reserve(&id)
            {
                let snippet = flat.text[range.clone()].trim();
                return Err(CompileError::new(
                    flat.line_at(range.start),
                    snippet,
                    format!("heading id `{id}` is used more than once"),
                ));
            }
        }
        Ok(anchors)
    }

    fn render(
        &self,
        flat: &Flattened,
        anchors: &mut AnchorSet,
    ) -> Result<(String, Vec<Heading>), CompileError> {
        let mut events: Vec<Event> = Vec::new();
        let mut headings = Vec::new();
        let mut closers: Vec<String> = Vec::new();
        let mut parser = Parser::new_ext(&flat.text, self.options);

        while let Some(event) = parser.next() {
            match event {
                Event::Html(text) => match flat.marker(&text) {
                    Some(Marker::Open(directive)) => {
                        let (open, close) = directive_markup(directive)?;
                        events.push(Event::Html(open.into()));
                        closers.push(close);
                    }
                    Some(Marker::Close) => {
                        events.push(Event::Html(closers.pop().unwrap_or_default().into()));
                    }
                    None => events.push(Event::Html(text)),
                },
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }) => {
                    let mut inner = Vec::new();
                    let mut heading_text = String::new();
                    for event in parser.by_ref() {
                        match &event {
                            Event::End(TagEnd::Heading(_)) => break,
                            Event::Text(t) | Event::Code(t) => heading_text.push_str(t),
                            _ => {}
                        }
                        inner.push(event);
                    }
                    let anchor = match id {
                        Some(explicit) => explicit.to_string(),
                        None => anchors.claim(&heading_text),
                    };
                    headings.push(Heading {
                        level: level as u8,
                        text: heading_text.trim().to_string(),
                        id: anchor.clone(),
                    });
                    events.push(Event::Start(Tag::Heading {
                        level,
                        id: Some(CowStr::from(anchor)),
                        classes,
                        attrs,
                    }));
                    events.extend(inner);
                    events.push(Event::End(TagEnd::Heading(level)));
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    let mut code = String::new();
                    for event in parser.by_ref() {
                        match event {
                            Event::End(TagEnd::CodeBlock) => break,
                            Event::Text(t) => code.push_str(&t),
                            _ => {}
                        }
                    }
                    let lang = match &kind {
                        CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
                        CodeBlockKind::Indented => None,
                    };
                    events.push(Event::Html(highlight::render(lang, &code).into()));
                }
                other => events.push(other),
            }
        }

        let mut html = String::new();
        md_html::push_html(&mut html, events.into_iter());
        Ok((html, headings))
    }
}

/// Stand-in for a block's children while its markup is rendered.
const INNER: &str = "\u{0}inner\u{0}";

/// Render `directive` and split its markup around where the children go.
fn directive_markup(directive: &Directive) -> Result<(String, String), CompileError> {
    let inner = if directive.has_content() { INNER } else { "" };
    let markup = directives::render(directive, inner)?.into_string();
    Ok(match markup.split_once(INNER) {
        Some((open, close)) => (open.to_string(), close.to_string()),
        None => (markup, String::new()),
    })
}

enum Marker<'a> {
    Open(&'a Directive),
    Close,
}

/// The whole body as one markdown document, blocks replaced by comment
/// markers on lines of their own.
struct Flattened<'a> {
    text: String,
    prefix: String,
    directives: Vec<&'a Directive>,
    /// `(offset in text, body line)` at the start of each markdown run.
    lines: Vec<(usize, usize)>,
}

impl<'a> Flattened<'a> {
    fn new(raw: &str, blocks: &'a [Block]) -> Self {
        let mut prefix = String::from("folio-block");
        while raw.contains(&prefix) {
            prefix.push('_');
        }
        let mut flat = Self {
            text: String::with_capacity(raw.len()),
            prefix,
            directives: Vec::new(),
            lines: Vec::new(),
        };
        let mut line = 1;
        flat.push_blocks(blocks, &mut line);
        flat
    }

    fn push_blocks(&mut self, blocks: &'a [Block], line: &mut usize) {
        for block in blocks {
            match block {
                Block::Markdown(text) => {
                    self.lines.push((self.text.len(), *line));
                    self.text.push_str(text);
                    *line += text.matches('\n').count();
                }
                Block::Directive(directive) => {
                    let index = self.directives.len();
                    self.directives.push(directive);
                    self.text
                        .push_str(&format!("\n<!--{}:open:{index}-->\n\n", self.prefix));
                    *line += 1;
                    self.push_blocks(&directive.children, line);
                    self.text
                        .push_str(&format!("\n<!--{}:close:{index}-->\n\n", self.prefix));
                    if !directive.self_closing {
                        *line += 1;
                    }
                }
            }
        }
    }

    fn marker(&self, html: &str) -> Option<Marker<'a>> {
        let rest = html
            .trim()
            .strip_prefix("<!--")?
            .strip_suffix("-->")?
            .strip_prefix(self.prefix.as_str())?;
        if let Some(index) = rest.strip_prefix(":open:") {
            let directive = self.directives.get(index.parse::<usize>().ok()?)?;
            return Some(Marker::Open(directive));
        }
        rest.strip_prefix(":close:").map(|_| Marker::Close)
    }

    /// Body line of a byte offset inside a markdown run.
    fn line_at(&self, offset: usize) -> usize {
        let run = self.lines.partition_point(|&(start, _)| start <= offset);
        match run.checked_sub(1).map(|i| self.lines[i]) {
            Some((start, line)) => line + self.text[start..offset].matches('\n').count(),
            None => 1,
        }
    }
}

/// Heading ids already handed out within one body.
#[derive(Debug, Default)]
struct AnchorSet {
    used: HashSet<String>,
}

impl AnchorSet {
    /// Claim a unique id derived from heading text.
    fn claim(&mut self, text: &str) -> String {
        let base = anchor_slug(text);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Reserve an explicit `{#id}`. False if it was already taken.
    fn reserve(&mut self, id: &str) -> bool {
        self.used.insert(id.to_string())
    }
}

/// GitHub-style anchor: lowercase alphanumerics, `-` for spaces and hyphens.
fn anchor_slug(text: &str) -> String {
    let slug: String = text
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_lowercase().collect::<String>())
            } else if c == ' ' || c == '-' {
                Some("-".to_string())
            } else {
                None
            }
        })
        .collect();
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> Compiler {
        Compiler::new(&MarkupConfig::default())
    }

    // =========================================================================
    // Markdown
    // =========================================================================

    #[test]
    fn paragraphs_and_emphasis() {
        let body = compiler().compile("Hello *world*\n").unwrap();
        assert_eq!(body.html, "<p>Hello <em>world</em></p>\n");
        assert_eq!(body.raw, "Hello *world*\n");
    }

    #[test]
    fn gfm_extensions_enabled() {
        let body = compiler()
            .compile("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n")
            .unwrap();
        assert!(body.html.contains("<table>"));
        assert!(body.html.contains("<del>gone</del>"));
        assert!(body.html.contains("type=\"checkbox\""));
    }

    #[test]
    fn empty_body_compiles_to_empty_html() {
        let body = compiler().compile("").unwrap();
        assert_eq!(body.html, "");
        assert!(body.headings.is_empty());
    }

    // =========================================================================
    // Heading anchors
    // =========================================================================

    #[test]
    fn headings_get_anchor_ids() {
        let body = compiler().compile("# Hello, World!\n\n## Next `step`\n").unwrap();
        assert!(body.html.contains("<h1 id=\"hello-world\">Hello, World!</h1>"));
        assert_eq!(
            body.headings,
            vec![
                Heading {
                    level: 1,
                    text: "Hello, World!".into(),
                    id: "hello-world".into()
                },
                Heading {
                    level: 2,
                    text: "Next step".into(),
                    id: "next-step".into()
                },
            ]
        );
    }

    #[test]
    fn duplicate_headings_suffixed() {
        let body = compiler().compile("## Setup\n\n## Setup\n\n## Setup\n").unwrap();
        let ids: Vec<_> = body.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["setup", "setup-1", "setup-2"]);
    }

    #[test]
    fn explicit_heading_id_kept() {
        let body = compiler().compile("## Intro {#start}\n").unwrap();
        assert!(body.html.contains("id=\"start\""));
        assert_eq!(body.headings[0].id, "start");
    }

    #[test]
    fn generated_anchor_steps_around_explicit_id() {
        let body = compiler().compile("## Start\n\n## Intro {#start}\n").unwrap();
        let ids: Vec<_> = body.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["start-1", "start"]);
        assert!(body.html.contains("<h2 id=\"start-1\">Start</h2>"));
    }

    #[test]
    fn repeated_explicit_id_is_error() {
        let raw = "## A {#x}\n\ntext\n\n:::callout\n## B {#x}\n:::\n";
        let err = compiler().compile(raw).unwrap_err();
        assert_eq!(err.line, 6);
        assert_eq!(err.snippet, "## B {#x}");
        assert!(err.message.contains("`x`"));
    }

    #[test]
    fn punctuation_only_heading_falls_back() {
        assert_eq!(anchor_slug("!!!"), "section");
        assert_eq!(anchor_slug("  Ünïcode Title "), "ünïcode-title");
    }

    #[test]
    fn anchors_unique_across_blocks() {
        let raw = "## Note\n\n:::callout\n## Note\n:::\n";
        let body = compiler().compile(raw).unwrap();
        let ids: Vec<_> = body.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["note", "note-1"]);
    }

    // =========================================================================
    // Code blocks
    // =========================================================================

    #[test]
    fn fenced_code_highlighted() {
        let body = compiler().compile("```rust\nlet x = 1;\n```\n").unwrap();
        assert!(body.html.contains("<pre class=\"code\" data-lang=\"rust\">"));
        assert!(body.html.contains("<span class=\"tok-kw\">let</span>"));
    }

    #[test]
    fn fenced_code_info_string_uses_first_word() {
        let body = compiler().compile("```python title=x.py\npass\n```\n").unwrap();
        assert!(body.html.contains("data-lang=\"python\""));
    }

    #[test]
    fn indented_block_marker_is_code() {
        let body = compiler().compile("Syntax:\n\n    :::\n    :::callout\n").unwrap();
        assert!(body.html.contains("<code>:::\n:::callout\n</code>"));
        assert!(!body.html.contains("<aside"));
    }

    #[test]
    fn indented_code_escaped() {
        let body = compiler().compile("    <b>\n").unwrap();
        assert!(body.html.contains("<pre class=\"code\"><code>&lt;b&gt;\n</code></pre>"));
    }

    // =========================================================================
    // Embedded blocks
    // =========================================================================

    #[test]
    fn callout_content_is_markdown() {
        let body = compiler()
            .compile(":::callout type=tip\nUse **bold**.\n:::\n")
            .unwrap();
        assert_eq!(
            body.html,
            "<aside class=\"callout callout-tip\" role=\"note\">\n<p>Use <strong>bold</strong>.</p>\n</aside>"
        );
    }

    #[test]
    fn reference_link_resolves_across_block() {
        let raw = "See [docs].\n\n:::callout\nx\n:::\n\n[docs]: https://example.com\n";
        let body = compiler().compile(raw).unwrap();
        assert!(body.html.contains("<p>See <a href=\"https://example.com\">docs</a>.</p>"));
        assert!(body.html.contains("<p>x</p>"));
    }

    #[test]
    fn reference_defined_inside_block_resolves_outside() {
        let raw = ":::callout\n[docs]: https://example.com\n:::\n\nSee [docs].\n";
        let body = compiler().compile(raw).unwrap();
        assert!(body.html.contains("<a href=\"https://example.com\">docs</a>"));
    }

    #[test]
    fn footnote_resolves_across_block() {
        let raw = "Claim[^1].\n\n:::callout type=tip\nSee below.\n:::\n\n[^1]: Source.\n";
        let body = compiler().compile(raw).unwrap();
        let reference = "<sup class=\"footnote-reference\"><a href=\"#1\">1</a></sup>";
        assert!(body.html.contains(reference));
        assert!(body.html.contains("class=\"footnote-definition\""));
        assert!(!body.html.contains("[^1]"));
    }

    #[test]
    fn nested_blocks_wrap_in_order() {
        let raw = ":::callout\nouter\n:::figure src=a.png\nCaption\n:::\nafter\n:::\n";
        let html = compiler().compile(raw).unwrap().html;
        let needles = ["<aside", "outer", "<figure", "Caption", "</figure>", "after", "</aside>"];
        let order: Vec<_> = needles.iter().map(|n| html.find(n).unwrap()).collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{html}");
    }

    #[test]
    fn marker_lookalike_in_body_stays_text() {
        let raw = "<!--folio-block:close:0-->\n\n:::callout\nx\n:::\n";
        let html = compiler().compile(raw).unwrap().html;
        assert!(html.contains("<!--folio-block:close:0-->"));
        assert!(html.ends_with("</aside>"));
    }

    #[test]
    fn disabled_extension_fails() {
        let compiler = Compiler::new(&MarkupConfig { extensions: vec![] });
        let err = compiler.compile("ok\n\n:::callout\nx\n:::\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(
            err.to_string(),
            "line 3: block type `callout` is not enabled in markup.extensions (`:::callout`)"
        );
    }

    #[test]
    fn render_error_reports_block_line() {
        let err = compiler().compile("intro\n:::figure alt=x\ncap\n:::\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("src"));
    }

    // =========================================================================
    // Determinism
    // =========================================================================

    #[test]
    fn compile_is_deterministic() {
        let raw = "# T\n\n```js\nconst a = 'b';\n```\n\n:::youtube id=abc :::\n";
        let a = compiler().compile(raw).unwrap();
        let b = compiler().compile(raw).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn digest_tracks_html() {
        let a = compiler().compile("one\n").unwrap();
        let b = compiler().compile("two\n").unwrap();
        assert_ne!(a.digest, b.digest);
    }
}
