//! HTML → Slack mrkdwn conversion.
//!
//! Slack wants `&`, `<` and `>` escaped as entities in message text, so those
//! three entities are passed through untouched while everything else is
//! decoded. Any bare `&`, `<` or `>` left over after tag stripping is escaped.
//! Links are staged behind control-character placeholders so the final
//! tag-stripping pass cannot eat the `<url|label>` syntax. `<pre>` bodies are
//! lifted out before whitespace collapsing and restored verbatim at the end.

use regex::{Captures, Regex};
use std::sync::OnceLock;

const LINK_OPEN: char = '\u{1}';
const LINK_CLOSE: char = '\u{2}';
const PRE_SLOT: char = '\u{3}';

struct Patterns {
    markup: Regex,
    whitespace_run: Regex,
    line_break: Regex,
    paragraph_close: Regex,
    block_open: Regex,
    list_item_open: Regex,
    list_item_close: Regex,
    list_bounds: Regex,
    pre: Regex,
    blockquote: Regex,
    strong: Regex,
    emphasis: Regex,
    strike: Regex,
    code: Regex,
    anchor: Regex,
    any_tag: Regex,
    comment: Regex,
    pre_slot: Regex,
    bare_ampersand: Regex,
    numeric_entity: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("static formatter pattern");
        Patterns {
            markup: re(r"(?i)<[a-z/!][^>]*>|&[a-z#][a-z0-9]*;"),
            whitespace_run: re(r"[ \t\r\n]+"),
            line_break: re(r"(?i)<br\s*/?>"),
            paragraph_close: re(r"(?i)</(?:p|div|h[1-6])>"),
            block_open: re(r"(?i)<(?:p|div|h[1-6])(?:\s[^>]*)?>"),
            list_item_open: re(r"(?i)<li(?:\s[^>]*)?>"),
            list_item_close: re(r"(?i)</li>"),
            list_bounds: re(r"(?i)</?(?:ul|ol)(?:\s[^>]*)?>"),
            pre: re(r"(?is)<pre(?:\s[^>]*)?>(.*?)</pre>"),
            blockquote: re(r"(?is)<blockquote(?:\s[^>]*)?>(.*?)</blockquote>"),
            strong: re(r"(?is)<(?:strong|b)(?:\s[^>]*)?>(.*?)</(?:strong|b)>"),
            emphasis: re(r"(?is)<(?:em|i)(?:\s[^>]*)?>(.*?)</(?:em|i)>"),
            strike: re(r"(?is)<(?:s|strike|del)(?:\s[^>]*)?>(.*?)</(?:s|strike|del)>"),
            code: re(r"(?is)<code(?:\s[^>]*)?>(.*?)</code>"),
            anchor: re(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#),
            any_tag: re(r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^>]*)?/?>"),
            comment: re(r"(?is)<!--.*?-->|<!doctype[^>]*>"),
            pre_slot: re(r"\s*\x03([0-9]+)\x03\s*"),
            bare_ampersand: re(r"&(#?[a-zA-Z0-9]+;)?"),
            numeric_entity: re(r"&#(?:x([0-9a-fA-F]+)|([0-9]+));"),
            blank_lines: re(r"\n{3,}"),
        }
    })
}

/// Converts raw feed content into chat markup. Pure and total.
pub fn to_chat_markup(raw: &str) -> String {
    let p = patterns();
    if !p.markup.is_match(raw) {
        return escape_plain(raw).trim().to_string();
    }

    let text = p.comment.replace_all(raw, "");
    let mut preformatted = Vec::new();
    let text = p.pre.replace_all(&text, |caps: &Captures| {
        let body = p.any_tag.replace_all(&caps[1], "");
        let body = decode_entities(&escape_bare(&body));
        preformatted.push(format!("```{}```", body.trim_matches(['\r', '\n'])));
        format!("{PRE_SLOT}{}{PRE_SLOT}", preformatted.len() - 1)
    });

    // HTML whitespace is insignificant; structure comes from the tags.
    let text = p.whitespace_run.replace_all(&text, " ");
    let text = p.pre_slot.replace_all(&text, "\n\n\x03${1}\x03\n\n");
    let text = p.line_break.replace_all(&text, "\n");
    let text = p.blockquote.replace_all(&text, |caps: &Captures| {
        let inner = p.any_tag.replace_all(&caps[1], "");
        let quoted: Vec<String> = inner
            .trim()
            .lines()
            .map(|line| format!("> {}", line.trim()))
            .collect();
        format!("\n{}\n\n", quoted.join("\n"))
    });
    let text = p.paragraph_close.replace_all(&text, "\n\n");
    let text = p.block_open.replace_all(&text, "");
    let text = p.list_item_open.replace_all(&text, "• ");
    let text = p.list_item_close.replace_all(&text, "\n");
    let text = p.list_bounds.replace_all(&text, "\n");
    let text = p.anchor.replace_all(&text, |caps: &Captures| {
        let href = caps[1].trim();
        let label = p.any_tag.replace_all(&caps[2], "");
        let label = label.trim();
        if href.is_empty() {
            label.to_string()
        } else if label.is_empty() || label == href {
            format!("{LINK_OPEN}{href}{LINK_CLOSE}")
        } else {
            format!("{LINK_OPEN}{href}|{label}{LINK_CLOSE}")
        }
    });
    let text = p.strong.replace_all(&text, "*$1*");
    let text = p.emphasis.replace_all(&text, "_${1}_");
    let text = p.strike.replace_all(&text, "~$1~");
    let text = p.code.replace_all(&text, "`$1`");
    let text = p.any_tag.replace_all(&text, "");
    let text = decode_entities(&escape_bare(&text));
    let text = text.replace(LINK_OPEN, "<").replace(LINK_CLOSE, ">");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let text = lines.join("\n");
    let mut text = p.blank_lines.replace_all(&text, "\n\n").trim().to_string();
    for (index, block) in preformatted.iter().enumerate() {
        text = text.replace(&format!("{PRE_SLOT}{index}{PRE_SLOT}"), block);
    }
    text
}

/// Escapes `<`, `>` and any `&` that does not start an entity.
fn escape_bare(text: &str) -> String {
    let text = patterns()
        .bare_ampersand
        .replace_all(text, |caps: &Captures| match caps.get(1) {
            Some(_) => caps[0].to_string(),
            None => "&amp;".to_string(),
        });
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Decodes entities other than the three Slack requires to stay escaped.
fn decode_entities(text: &str) -> String {
    let p = patterns();
    let text = p.numeric_entity.replace_all(text, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        match code {
            Some(38) => "&amp;".to_string(),
            Some(60) => "&lt;".to_string(),
            Some(62) => "&gt;".to_string(),
            Some(160) => " ".to_string(),
            Some(code) => char::from_u32(code)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string()),
            None => caps[0].to_string(),
        }
    });
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&rsquo;", "\u{2019}")
        .replace("&lsquo;", "\u{2018}")
        .replace("&rdquo;", "\u{201d}")
        .replace("&ldquo;", "\u{201c}")
        .replace("&hellip;", "\u{2026}")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}")
}

pub(crate) fn escape_plain(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(to_chat_markup("  a < b & c  "), "a &lt; b &amp; c");
    }

    #[test]
    fn stray_angle_brackets_in_html_survive_escaped() {
        assert_eq!(
            to_chat_markup("<p>if a < b and c > d then AT&T wins &amp; ok</p>"),
            "if a &lt; b and c &gt; d then AT&amp;T wins &amp; ok"
        );
        assert_eq!(to_chat_markup("<p>x</p><!-- hidden -->"), "x");
    }

    #[test]
    fn preformatted_blocks_keep_lines_and_indentation() {
        assert_eq!(
            to_chat_markup("<pre>fn main() {\n    run();\n}</pre>"),
            "```fn main() {\n    run();\n}```"
        );
        let html = "<p>Try:</p>\n<pre><code>if a &lt; b {\n    go();\n}\n</code></pre><p>done</p>";
        assert_eq!(
            to_chat_markup(html),
            "Try:\n\n```if a &lt; b {\n    go();\n}```\n\ndone"
        );
    }

    #[test]
    fn paragraphs_and_breaks() {
        let html = "<p>First line<br>second line</p>\n<p>Next paragraph</p>";
        assert_eq!(
            to_chat_markup(html),
            "First line\nsecond line\n\nNext paragraph"
        );
    }

    #[test]
    fn inline_emphasis() {
        let html = "<p><strong>bold</strong>, <em>italic</em>, <del>gone</del>, <code>x = 1</code></p>";
        assert_eq!(to_chat_markup(html), "*bold*, _italic_, ~gone~, `x = 1`");
    }

    #[test]
    fn links_use_slack_syntax() {
        let html = r#"<p>See <a href="https://example.com/docs" target="_blank">the <b>docs</b></a> or <a href="https://example.com">https://example.com</a></p>"#;
        assert_eq!(
            to_chat_markup(html),
            "See <https://example.com/docs|the docs> or <https://example.com>"
        );
    }

    #[test]
    fn lists_become_bullets() {
        let html = "<ul><li>one</li><li>two</li></ul>";
        assert_eq!(to_chat_markup(html), "• one\n• two");
    }

    #[test]
    fn entities_decoded_except_slack_reserved() {
        let html = "<p>Tom&#39;s &quot;tips&quot; &amp; tricks: 1 &lt; 2&nbsp;&#x2014; ok</p>";
        assert_eq!(
            to_chat_markup(html),
            "Tom's \"tips\" &amp; tricks: 1 &lt; 2 \u{2014} ok"
        );
    }

    #[test]
    fn blockquotes_are_prefixed() {
        let html = "<blockquote><p>quoted text</p></blockquote><p>answer</p>";
        assert_eq!(to_chat_markup(html), "> quoted text\n\nanswer");
    }
}
