use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// Pattern stripped from a base name to recover the name a user typed.
/// Sequential renames append a digit run, so that is the default.
pub const DEFAULT_STRIP_PATTERN: &str = r"\d+$";

static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.*?)(?P<digits>\d+)$").unwrap());

/// Collection-level naming convention hook used by `effective_display_name`.
#[derive(Debug, Clone)]
pub struct NamingConvention {
    strip: Regex,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            strip: Regex::new(DEFAULT_STRIP_PATTERN).unwrap(),
        }
    }
}

impl NamingConvention {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            strip: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.strip.as_str()
    }

    /// Remove the convention's decoration from `base_name`. A name that would
    /// become empty is returned unchanged.
    pub fn strip(&self, base_name: &str) -> String {
        let stripped = self.strip.replace(base_name, "");
        if stripped.trim().is_empty() {
            base_name.to_string()
        } else {
            stripped.into_owned()
        }
    }
}

/// Zero-padding width for sequence numbers: the digit count of `max_count`.
pub fn sequence_width(max_count: usize) -> usize {
    max_count.max(1).to_string().len()
}

/// `<prefix><index padded to max_count's width>[.<extension>]`
pub fn sequential_name(prefix: &str, index: usize, max_count: usize, extension: Option<&str>) -> String {
    let width = sequence_width(max_count);
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}{:0width$}.{}", prefix, index, ext, width = width),
        _ => format!("{}{:0width$}", prefix, index, width = width),
    }
}

struct NameKey {
    stem: String,
    number: Option<String>,
}

fn name_key(base_name: &str) -> NameKey {
    let folded: String = base_name.nfc().collect::<String>().to_lowercase();
    match TRAILING_DIGITS_RE.captures(&folded) {
        Some(caps) => {
            let digits = caps["digits"].trim_start_matches('0');
            NameKey {
                stem: caps["stem"].to_string(),
                number: Some(if digits.is_empty() { "0".to_string() } else { digits.to_string() }),
            }
        }
        None => NameKey {
            stem: folded,
            number: None,
        },
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Case-insensitive name order that compares a trailing digit run by value,
/// so "img2" < "img10" < "img9b".
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let ka = name_key(a);
    let kb = name_key(b);
    ka.stem.cmp(&kb.stem).then_with(|| match (&ka.number, &kb.number) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_numbers(x, y),
    })
}

/// Whether `name` can be used as a rename prefix inside a single directory.
pub fn is_valid_prefix(name: &str) -> bool {
    !name.contains(['/', '\\', '\0']) && name != "." && name != ".."
}
