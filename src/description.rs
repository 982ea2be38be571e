use crate::config::ShortDescriptionConfig;
use regex::Regex;

lazy_static::lazy_static! {
    static ref RULER: Regex = Regex::new(r"={4,}").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Turns extracted description lines into the bounded summary stored with an advisory.
#[derive(Debug, Clone)]
pub struct ShortDescriptionBuilder {
    max_chars: usize,
    suffix: String,
    fallback: String,
}

impl Default for ShortDescriptionBuilder {
    fn default() -> Self {
        Self::new(&ShortDescriptionConfig::default())
    }
}

impl ShortDescriptionBuilder {
    pub fn new(config: &ShortDescriptionConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            suffix: config.truncation_suffix.clone(),
            fallback: config.fallback.clone(),
        }
    }

    pub fn build<S: AsRef<str>>(&self, lines: &[S]) -> String {
        let joined = lines
            .iter()
            .map(|line| line.as_ref().trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.clean(&joined)
    }

    /// Cleans a single string. Running it on its own output returns that output.
    pub fn clean(&self, text: &str) -> String {
        if self.is_truncated_output(text) {
            return text.to_string();
        }

        let text = RULER.replace_all(text, "");
        let text = WHITESPACE.replace_all(&text, " ");
        let text = text.trim();

        if text.is_empty() {
            return self.fallback.clone();
        }
        if text.chars().count() > self.max_chars {
            let head: String = text.chars().take(self.max_chars).collect();
            return format!("{}{}", head, self.suffix);
        }
        text.to_string()
    }

    // A truncated head may end in a space, which trimming would otherwise eat.
    fn is_truncated_output(&self, text: &str) -> bool {
        match text.strip_suffix(self.suffix.as_str()) {
            Some(head) => {
                head.chars().count() == self.max_chars
                    && !head.starts_with(char::is_whitespace)
                    && !RULER.is_match(head)
                    && WHITESPACE.replace_all(head, " ") == head
            }
            None => false,
        }
    }
}
