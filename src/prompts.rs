//! Prompts for block-level translation.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! tests can inspect the text without calling a model.

/// System message sent with every translation request.
pub const TRANSLATION_SYSTEM_PROMPT: &str =
    "You are a professional academic translator. Translate the user's text faithfully, \
keep technical terminology precise and output only the translation.";

/// Human-readable name of a target language code.
///
/// Unknown codes are passed through unchanged so any language the model
/// understands can still be requested.
pub fn language_name(code: &str) -> &str {
    match code.trim().to_ascii_lowercase().as_str() {
        "zh" | "zh-cn" => "中文",
        "en" => "English",
        "ja" => "日本語",
        "ko" => "한국어",
        _ => code,
    }
}

/// Build the user message asking for one paragraph to be translated.
pub fn translation_prompt(text: &str, target_lang: &str) -> String {
    let lang = language_name(target_lang);
    format!(
        "Translate the following academic paragraph into {lang}.\n\
Requirements:\n\
1. Keep technical terms accurate and consistent.\n\
2. Preserve formulas, citations and numbers exactly.\n\
3. Output only the translation, without explanations or notes.\n\n\
Text:\n{text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_languages() {
        assert_eq!(language_name("zh"), "中文");
        assert_eq!(language_name("EN"), "English");
        assert_eq!(language_name("ja"), "日本語");
        assert_eq!(language_name("ko"), "한국어");
    }

    #[test]
    fn unknown_language_passes_through() {
        assert_eq!(language_name("fr"), "fr");
    }

    #[test]
    fn prompt_contains_text_and_language() {
        let p = translation_prompt("Attention is all you need.", "zh");
        assert!(p.contains("中文"));
        assert!(p.ends_with("Attention is all you need."));
        assert!(p.contains("without explanations"));
    }
}
