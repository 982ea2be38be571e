//! Introductory-text extraction for advisories that carry an "Affected Products" block.
//!
//! The intro text sits between the end of the product list and the description
//! heading. Two list layouts exist:
//!
//! - bulleted (`* product`), closed by the first non-bullet line, followed by `## Description:`
//! - one product per line, closed by a line of underscores, followed by `Description:`
//!
//! When neither layout is recognizable, a sentence-opener search is used instead.

use regex::{Regex, RegexBuilder};

const AFFECTED_PRODUCTS_HEADER: &str = "Affected Products:";

lazy_static::lazy_static! {
    static ref UPDATE_THAT: Regex = RegexBuilder::new(r"^An update that (solves|fixes|contains)")
        .case_insensitive(true)
        .build()
        .unwrap();
    static ref NOW_AVAILABLE: Regex =
        RegexBuilder::new(r"^(Security )?[Uu]pdate (for|to) .+ (is|are) now available")
            .case_insensitive(true)
            .build()
            .unwrap();
    static ref THIS_UPDATE: Regex = RegexBuilder::new(r"^This update (fixes|addresses|resolves)")
        .case_insensitive(true)
        .build()
        .unwrap();
}

const CONTINUATION_OPENERS: [&str; 4] = [
    "is now available",
    "can now be",
    "are now available",
    "installed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductListFormat {
    /// Variant 1: `* product` bullets, description under `## Description:`.
    Bulleted,
    /// Variant 2: one product per line, closed by underscores, then `Description:`.
    LineList,
}

impl ProductListFormat {
    pub fn description_marker(&self) -> &'static str {
        match self {
            ProductListFormat::Bulleted => "## Description:",
            ProductListFormat::LineList => "Description:",
        }
    }
}

/// Position of the product block inside the body lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductBlock {
    pub header: usize,
    pub format: ProductListFormat,
    /// Index of the first line after the block.
    pub end: usize,
}

/// Finds the header line and classifies the list by the first non-blank line after it.
pub fn classify(lines: &[&str]) -> Option<(usize, ProductListFormat)> {
    let header = lines
        .iter()
        .position(|line| line.trim() == AFFECTED_PRODUCTS_HEADER)?;
    let first = lines[header + 1..]
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty());
    let format = match first {
        Some(line) if line.starts_with('*') => ProductListFormat::Bulleted,
        _ => ProductListFormat::LineList,
    };
    Some((header, format))
}

pub fn locate_block(lines: &[&str]) -> Option<ProductBlock> {
    let (header, format) = classify(lines)?;
    let rest = lines.iter().enumerate().skip(header + 1);
    let end = match format {
        ProductListFormat::Bulleted => rest
            .map(|(i, line)| (i, line.trim()))
            .find(|(_, line)| !line.is_empty() && !line.starts_with('*'))
            .map(|(i, _)| i)?,
        ProductListFormat::LineList => rest
            .map(|(i, line)| (i, line.trim()))
            .find(|(_, line)| line.starts_with('_'))
            .map(|(i, _)| i + 1)?,
    };
    Some(ProductBlock {
        header,
        format,
        end,
    })
}

/// All non-blank lines strictly between the block end and the description marker.
pub fn intro_between_markers(lines: &[&str]) -> Option<String> {
    let block = locate_block(lines)?;
    let marker = block.format.description_marker();
    let description = (block.end..lines.len()).find(|&i| lines[i].trim() == marker)?;

    let intro: Vec<&str> = lines[block.end..description]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    if intro.is_empty() {
        None
    } else {
        Some(intro.join(" ").trim().to_string())
    }
}

/// Searches for a well-known opening sentence, merging an immediate continuation line.
pub fn fallback_sentence(lines: &[&str]) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if !UPDATE_THAT.is_match(line) {
            continue;
        }

        let mut intro = line.to_string();
        for next in lines[i + 1..].iter().map(|l| l.trim()) {
            if next.is_empty() {
                continue;
            }
            if next.starts_with('#') {
                break;
            }
            if CONTINUATION_OPENERS.iter().any(|p| next.starts_with(p)) {
                intro.push(' ');
                intro.push_str(next);
                break;
            } else if !intro.ends_with('.') && next.len() > 10 {
                intro.push(' ');
                intro.push_str(next);
            } else {
                break;
            }
        }
        return Some(intro.trim().to_string());
    }

    lines
        .iter()
        .map(|line| line.trim())
        .find(|line| NOW_AVAILABLE.is_match(line) || THIS_UPDATE.is_match(line))
        .map(str::to_string)
}

/// Last resort: the first line that reads like prose rather than a header or key/value.
pub fn first_descriptive_line(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .find(|line| {
            let head: String = line.chars().take(50).collect();
            !line.is_empty()
                && !line.starts_with('#')
                && !head.contains(':')
                && line.chars().count() > 20
                && !line.starts_with("Announcement ID")
        })
        .map(str::to_string)
}

/// Structured block first, then sentence openers, then the first prose line.
pub fn extract_intro_text(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let structured = intro_between_markers(&lines);
    if structured.is_none() {
        log::debug!("No Affected Products block with description marker, using fallback");
    }
    structured
        .or_else(|| fallback_sentence(&lines))
        .or_else(|| first_descriptive_line(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BULLETED: &str = "\
# Security update for libxml2

Announcement ID: SUSE-SU-2025:01234-1
Rating: moderate

Affected Products:

  * openSUSE Leap 15.6
  * SUSE Linux Enterprise Server 15 SP6

An update that solves two vulnerabilities
can now be installed.

## Description:

This update for libxml2 fixes the following issues:
";

    const LINE_LIST: &str = "\
SUSE Security Update: Security update for curl
______________________________________________________________________________

Announcement ID:    openSUSE-SU-2021:1234-1
Rating:             important
Affected Products:
                    openSUSE Leap 15.3
                    SUSE Linux Enterprise 15
______________________________________________________________________________

   An update that fixes three vulnerabilities is now available.

Description:

   This update for curl fixes the following issues:
";

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_classify_bulleted_block() {
        let lines = lines(BULLETED);
        let block = locate_block(&lines).unwrap();
        assert_eq!(block.format, ProductListFormat::Bulleted);
        assert_eq!(lines[block.end].trim(), "An update that solves two vulnerabilities");
    }

    #[test]
    fn test_bulleted_intro_excludes_markers() {
        let intro = intro_between_markers(&lines(BULLETED)).unwrap();
        assert_eq!(
            intro,
            "An update that solves two vulnerabilities can now be installed."
        );
        assert!(!intro.contains('*'));
        assert!(!intro.contains("## Description:"));
    }

    #[test]
    fn test_line_list_intro() {
        let lines = lines(LINE_LIST);
        let block = locate_block(&lines).unwrap();
        assert_eq!(block.format, ProductListFormat::LineList);
        assert_eq!(
            intro_between_markers(&lines).unwrap(),
            "An update that fixes three vulnerabilities is now available."
        );
    }

    #[test]
    fn test_missing_description_marker_uses_sentence_fallback() {
        let text = "Affected Products:\n  * Leap 15.6\nAn update that fixes one\nvulnerability is important\n# References\n";
        assert!(intro_between_markers(&lines(text)).is_none());
        assert_eq!(
            extract_intro_text(text).unwrap(),
            "An update that fixes one vulnerability is important"
        );
    }

    #[test]
    fn test_fallback_continuation_phrase() {
        let text = "An update that solves one vulnerability\n\nis now available.\nMore text here that is long\n";
        assert_eq!(
            fallback_sentence(&lines(text)).unwrap(),
            "An update that solves one vulnerability is now available."
        );
    }

    #[test]
    fn test_fallback_stops_after_terminal_punctuation() {
        let text = "An update that fixes one vulnerability.\nSomething unrelated afterwards.\n";
        assert_eq!(
            fallback_sentence(&lines(text)).unwrap(),
            "An update that fixes one vulnerability."
        );
    }

    #[test]
    fn test_other_openers() {
        let text = "Header: x\nThis update addresses CVE-2024-0001.\n";
        assert_eq!(
            fallback_sentence(&lines(text)).unwrap(),
            "This update addresses CVE-2024-0001."
        );
        let text = "Security update for nodejs20 is now available\n";
        assert!(fallback_sentence(&lines(text)).is_some());
    }

    #[test]
    fn test_first_descriptive_line() {
        let text = "# Title\nAnnouncement ID: x\nshort\nThe kernel was updated to fix several issues.\n";
        assert_eq!(
            first_descriptive_line(&lines(text)).unwrap(),
            "The kernel was updated to fix several issues."
        );
        assert!(first_descriptive_line(&lines("# only\nkey: value\n")).is_none());
    }
}
