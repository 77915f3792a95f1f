/// Polly voices available per language code. The first voice of each list is the default.
const POLLY_VOICES: &[(&str, &[&str])] = &[
    ("en-US", &["Joanna", "Matthew", "Kimberly", "Amy", "Brian", "Emma"]),
    ("en-GB", &["Emma", "Brian", "Amy", "Joanna"]),
    ("es-ES", &["Conchita", "Enrique"]),
    ("es-US", &["Lupe", "Miguel", "Penelope"]),
    ("fr-FR", &["Celine", "Mathieu", "Lea"]),
    ("de-DE", &["Marlene", "Hans", "Vicki"]),
    ("it-IT", &["Carla", "Giorgio"]),
    ("pt-BR", &["Camila", "Vitoria", "Ricardo"]),
    ("ja-JP", &["Mizuki", "Takumi"]),
    ("ko-KR", &["Seoyeon"]),
    ("zh-CN", &["Zhiyu"]),
    ("ru-RU", &["Tatyana", "Maxim"]),
];

const FALLBACK_LANGUAGE: &str = "en-US";

/// Voices offered for a language. Unknown languages get the en-US voices.
pub fn available_voices(language: &str) -> &'static [&'static str] {
    lookup(language)
        .or_else(|| lookup(FALLBACK_LANGUAGE))
        .unwrap_or(&[])
}

fn lookup(language: &str) -> Option<&'static [&'static str]> {
    POLLY_VOICES
        .iter()
        .find(|(code, _)| *code == language)
        .map(|(_, voices)| *voices)
}

pub fn default_voice(language: &str) -> &'static str {
    available_voices(language).first().copied().unwrap_or("Joanna")
}

pub fn is_valid_voice(language: &str, voice: &str) -> bool {
    available_voices(language).contains(&voice)
}

/// Returns `voice` if the catalog offers it for `language`, else the language's default voice.
pub fn checked_voice<'a>(language: &str, voice: &'a str) -> &'a str {
    if is_valid_voice(language, voice) {
        voice
    } else {
        let substitute = default_voice(language);
        tracing::warn!(
            language,
            requested = voice,
            substitute,
            "Voice not available for language, using default voice"
        );
        substitute
    }
}
