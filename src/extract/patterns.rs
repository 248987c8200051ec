use regex::Regex;
use std::sync::OnceLock;

static PATTERNS: OnceLock<PatternSet> = OnceLock::new();

/// Line-level patterns shared by the text, table and chart passes.
#[derive(Debug)]
pub(crate) struct PatternSet {
    /// `# Heading` through `###### Heading`.
    pub heading: Regex,
    /// `- item`, `* item`, `+ item`, `• item`, `1. item`, `2) item`.
    pub list_item: Regex,
    /// `|---|:---:|` markdown header separators.
    pub separator: Regex,
    /// Two or more whitespace characters.
    pub multi_space: Regex,
    /// Figure captions: `Figure 3: ...`, `Fig. 2`, `Chart 1`, `Graph`, `Diagram`.
    pub caption: Regex,
}

impl PatternSet {
    fn new() -> Self {
        Self {
            heading: Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$")
                .expect("heading regex must compile"),
            list_item: Regex::new(r"^\s*(?:[-*+•]|\d{1,3}[.)])\s+(.+)$")
                .expect("list_item regex must compile"),
            separator: Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$")
                .expect("separator regex must compile"),
            multi_space: Regex::new(r"\s{2,}").expect("multi_space regex must compile"),
            caption: Regex::new(r"(?i)^\s*(?:figure\b|fig\.|chart\b|graph\b|diagram\b)")
                .expect("caption regex must compile"),
        }
    }
}

pub(crate) fn patterns() -> &'static PatternSet {
    PATTERNS.get_or_init(PatternSet::new)
}
