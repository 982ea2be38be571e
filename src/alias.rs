use crate::config::AliasConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

/// Supplies the uniqueness suffix appended to every alias.
pub trait SuffixSource: Send + Sync {
    fn suffix(&self, len: usize) -> String;
}

/// Lower-case alphanumerics from the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn suffix(&self, len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect::<String>()
            .to_lowercase()
    }
}

/// Always returns the same suffix, cut or padded to the requested length.
#[derive(Debug, Clone)]
pub struct FixedSuffix(pub String);

impl SuffixSource for FixedSuffix {
    fn suffix(&self, len: usize) -> String {
        self.0.chars().cycle().take(len).collect()
    }
}

lazy_static::lazy_static! {
    // Applied in order to the lower-cased title.
    static ref SLUG_STEPS: Vec<(Regex, &'static str)> = [
        (r"security and bug fix (update)?", ""),
        (r"-security-advisory-update-", "-"),
        (r"[\[\]]", ""),
        (r"x86_64", "x86-64"),
        // cp1252 quote and dash bytes as they show up in mis-decoded subjects
        (r"<93>|<94>|\x{201C}|\x{201D}", "\""),
        (r"<92>|\x{2019}", "'"),
        (r"<97>|\x{2014}", "--"),
        (r#"""#, ""),
        (r"[^\x20-\x7E\r\n]", ""),
        (r"\s+$", ""),
        (r",$", ""),
        (r"-$", ""),
        (r"\.+", "-"),
        (r":+", "-"),
        (r",+", "-"),
        (r"'", ""),
        (r"/", "-"),
        (r" +", "-"),
        (r"_", "-"),
        (r"-+", "-"),
        (r"[ :!@#$%^&*()+=./]", "-"),
        (r"-{2,}", "-"),
    ]
    .iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
    .collect();
}

pub struct AliasSlugGenerator {
    suffix_length: usize,
    source: Box<dyn SuffixSource>,
}

impl Default for AliasSlugGenerator {
    fn default() -> Self {
        Self::new(&AliasConfig::default())
    }
}

impl AliasSlugGenerator {
    pub fn new(config: &AliasConfig) -> Self {
        Self::with_source(config, Box::new(RandomSuffix))
    }

    pub fn with_source(config: &AliasConfig, source: Box<dyn SuffixSource>) -> Self {
        Self {
            suffix_length: config.suffix_length,
            source,
        }
    }

    /// The deterministic part of the alias.
    pub fn base_slug(&self, title: &str) -> String {
        let slug = SLUG_STEPS
            .iter()
            .fold(title.to_lowercase(), |acc, (re, replacement)| {
                re.replace_all(&acc, *replacement).into_owned()
            });
        slug.trim_matches('-').to_string()
    }

    /// A fresh alias; two calls with the same title differ only in the suffix.
    pub fn generate(&self, title: &str) -> String {
        let base = self.base_slug(title);
        let suffix = self.source.suffix(self.suffix_length).to_lowercase();
        if base.is_empty() {
            suffix
        } else {
            format!("{base}-{suffix}")
        }
    }
}
