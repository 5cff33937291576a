//! Post-processing: deterministic cleanup of raw LLM translations.
//!
//! Even with "output only the translation" in the prompt, chat models
//! sometimes wrap the answer in a code fence, lead with a "Translation:"
//! label, or carry zero-width characters over from PDF extraction. These
//! cheap string rules remove such artefacts without touching content.
//!
//! ## Rule Order
//!
//! Line endings are normalised before fences are stripped so the fence regex
//! only ever sees `\n`; labels are removed after the fence so a fenced label
//! is caught too.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all rules to a raw model answer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip one outer code fence (any language tag)
/// 3. Drop a leading "Translation:" / "译文：" label
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 1
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Trim the whole answer
///
/// Returns an empty string when nothing is left; the caller decides what an
/// empty translation means.
pub fn clean_translation(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fence(&s);
    let s = strip_label(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\n(.*?)\n?```$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Leading label ────────────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:translation|translated text|译文|翻译)\s*[:：]\s*").unwrap()
});

fn strip_label(input: &str) -> String {
    RE_LABEL.replace(input, "").into_owned()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 6: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_lang() {
        assert_eq!(clean_translation("```text\n你好，世界\n```"), "你好，世界");
        assert_eq!(clean_translation("```markdown\n# 标题\n```\n"), "# 标题");
    }

    #[test]
    fn test_strip_fence_no_lang() {
        assert_eq!(clean_translation("```\n第一段\n\n第二段\n```"), "第一段\n\n第二段");
    }

    #[test]
    fn test_inner_code_is_kept() {
        let input = "使用 `pip install` 安装。";
        assert_eq!(clean_translation(input), input);
    }

    #[test]
    fn test_crlf_and_trailing_spaces() {
        assert_eq!(clean_translation("第一行  \r\n第二行\r\n"), "第一行\n第二行");
    }

    #[test]
    fn test_label_removed() {
        assert_eq!(clean_translation("Translation: 深度学习"), "深度学习");
        assert_eq!(clean_translation("译文：深度学习"), "深度学习");
        assert_eq!(clean_translation("翻译的质量"), "翻译的质量");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(clean_translation("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(clean_translation("\u{FEFF}注意\u{200B}力"), "注意力");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert_eq!(clean_translation("  \n\u{200B}\n "), "");
    }
}
