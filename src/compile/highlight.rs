//! Syntax highlighting for fenced code blocks.
//!
//! A deliberately small lexer: comments, strings, numbers and keywords for a
//! handful of languages, emitted as `<span class="tok-*">` runs that a
//! stylesheet can color. Output depends only on the language name and the
//! code text.
//!
//! ```text
//! lang = "rust"            <pre class="code" data-lang="rust">
//! let x = 1; // one   →      <code class="language-rust"><span class="tok-kw">let</span> x = ...
//!                          </pre>
//! ```
//!
//! Unknown languages (and indented code) are escaped and wrapped without spans.

use maud::html;

#[derive(Debug)]
struct Language {
    keywords: &'static [&'static str],
    line_comments: &'static [&'static str],
    block_comment: Option<(&'static str, &'static str)>,
    quotes: &'static [char],
}

const RUST: Language = Language {
    keywords: &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
        "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
        "type", "unsafe", "use", "where", "while",
    ],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    quotes: &['"'],
};

const JAVASCRIPT: Language = Language {
    keywords: &[
        "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
        "delete", "else", "export", "extends", "false", "finally", "for", "from", "function",
        "if", "import", "in", "instanceof", "interface", "let", "new", "null", "return",
        "switch", "this", "throw", "true", "try", "type", "typeof", "undefined", "var", "void",
        "while", "yield",
    ],
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\'', '`'],
};

const PYTHON: Language = Language {
    keywords: &[
        "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
        "elif", "else", "except", "False", "finally", "for", "from", "if", "import", "in", "is",
        "lambda", "None", "not", "or", "pass", "raise", "return", "True", "try", "while",
        "with", "yield",
    ],
    line_comments: &["#"],
    block_comment: None,
    quotes: &['"', '\''],
};

const SHELL: Language = Language {
    keywords: &[
        "case", "do", "done", "elif", "else", "esac", "export", "fi", "for", "function", "if",
        "in", "local", "return", "then", "until", "while",
    ],
    line_comments: &["#"],
    block_comment: None,
    quotes: &['"', '\''],
};

const TOML: Language = Language {
    keywords: &["true", "false"],
    line_comments: &["#"],
    block_comment: None,
    quotes: &['"', '\''],
};

const JSON: Language = Language {
    keywords: &["true", "false", "null"],
    line_comments: &[],
    block_comment: None,
    quotes: &['"'],
};

const CSS: Language = Language {
    keywords: &["important", "inherit", "initial", "none", "auto"],
    line_comments: &[],
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\''],
};

fn language(name: &str) -> Option<&'static Language> {
    match name.to_ascii_lowercase().as_str() {
        "rust" | "rs" => Some(&RUST),
        "javascript" | "js" | "jsx" | "mjs" | "typescript" | "ts" | "tsx" => Some(&JAVASCRIPT),
        "python" | "py" => Some(&PYTHON),
        "bash" | "sh" | "shell" | "zsh" | "console" => Some(&SHELL),
        "toml" => Some(&TOML),
        "json" | "jsonc" => Some(&JSON),
        "css" | "scss" => Some(&CSS),
        _ => None,
    }
}

#[derive(Debug, PartialEq)]
struct Token<'a> {
    class: Option<&'static str>,
    text: &'a str,
}

/// Render a code block as `<pre><code>` with highlight spans.
///
/// `lang` is the first word of the fence info string, if any.
pub fn render(lang: Option<&str>, code: &str) -> String {
    let tokens = match lang.and_then(language) {
        Some(def) => tokenize(def, code),
        None => vec![Token {
            class: None,
            text: code,
        }],
    };
    let code_class = lang.map(|l| format!("language-{l}"));

    html! {
        pre class="code" data-lang=[lang] {
            code class=[code_class] {
                @for token in &tokens {
                    @if let Some(class) = token.class {
                        span class=(class) { (token.text) }
                    } @else {
                        (token.text)
                    }
                }
            }
        }
    }
    .into_string()
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize<'a>(lang: &Language, code: &'a str) -> Vec<Token<'a>> {
    let mut tokens = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i < code.len() {
        let rest = &code[i..];
        let Some(first) = rest.chars().next() else {
            break;
        };

        let matched: Option<(&'static str, usize)> =
            if lang.line_comments.iter().any(|p| rest.starts_with(p)) {
                Some(("tok-com", rest.find('\n').unwrap_or(rest.len())))
            } else if let Some((open, close)) =
                lang.block_comment.filter(|(open, _)| rest.starts_with(open))
            {
                let end = rest[open.len()..]
                    .find(close)
                    .map(|pos| open.len() + pos + close.len())
                    .unwrap_or(rest.len());
                Some(("tok-com", end))
            } else if lang.quotes.contains(&first) {
                Some(("tok-str", string_len(rest, first)))
            } else if first.is_ascii_digit() {
                let len = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
                    .unwrap_or(rest.len());
                Some(("tok-num", len))
            } else if is_ident_start(first) {
                let len = rest
                    .find(|c: char| !is_ident_char(c))
                    .unwrap_or(rest.len());
                if lang.keywords.contains(&&rest[..len]) {
                    Some(("tok-kw", len))
                } else {
                    // Whole identifier stays plain so trailing digits are not numbers
                    i += len;
                    continue;
                }
            } else {
                None
            };

        match matched {
            Some((class, len)) => {
                if plain_start < i {
                    tokens.push(Token {
                        class: None,
                        text: &code[plain_start..i],
                    });
                }
                tokens.push(Token {
                    class: Some(class),
                    text: &rest[..len],
                });
                i += len;
                plain_start = i;
            }
            None => i += first.len_utf8(),
        }
    }

    if plain_start < code.len() {
        tokens.push(Token {
            class: None,
            text: &code[plain_start..],
        });
    }
    tokens
}

/// Byte length of a string literal starting at `text[0] == quote`.
///
/// Ends at the matching unescaped quote, or at the end of the line when the
/// literal is unterminated (backtick literals may span lines).
fn string_len(text: &str, quote: char) -> usize {
    let mut escaped = false;
    for (pos, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == quote => return pos + c.len_utf8(),
            '\n' if quote != '`' => return pos,
            _ => {}
        }
    }
    text.len()
}
