//! Fixed rewrite rules for links and raw file text.
//!
//! Rules are evaluated as ordered lists:
//!
//! - [`LINK_RULES`] run on every `href` the link rewriter finds. Feed
//!   retargeting comes first: a feed link ends in `rss`, which would
//!   otherwise be taken for an extensionless page.
//! - [`CLEANUP_RULES`] run on whole file text after domain substitution.
//!
//! Every rule is total: a value the rule does not match is returned as-is.

use regex::Regex;
use std::{borrow::Cow, fmt, sync::LazyLock};

use crate::utils::path::is_external_link;

/// Extension given to converted feed documents.
pub const FEED_EXTENSION: &str = "rss";

/// Extension appended to extensionless static pages.
pub const PAGE_EXTENSION: &str = "html";

/// Static asset families with their own cleanup pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Stylesheet,
    Script,
    FontWoff,
    FontTtf,
    Png,
    Jpeg,
}

impl AssetClass {
    /// File extension of the asset family (without the dot).
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Stylesheet => "css",
            Self::Script => "js",
            Self::FontWoff => "woff",
            Self::FontTtf => "ttf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Where a rule may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Any href, absolute or not.
    AnyLink,
    /// Only hrefs without scheme and without `//` prefix.
    SiteRelativeLink,
    /// Raw file text.
    Text,
}

/// A single pattern -> replacement transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteRule {
    /// `…/rss`, `…/rss/`, `…/rss/index.html` -> `…/rss/index.rss`
    RetargetFeed,
    /// `…/index.html` -> `…/`
    StripIndex,
    /// `…/about` -> `…/about.html`
    AppendExtension,
    /// `style.css%3Fv=1a2b` -> `style.css`
    StripVersionQuery(AssetClass),
    /// `logo.png.html` -> `logo.png`
    FixExtensionConfusion(AssetClass),
}

/// Rules applied to every `href`, in order.
pub const LINK_RULES: &[RewriteRule] = &[
    RewriteRule::RetargetFeed,
    RewriteRule::StripIndex,
    RewriteRule::AppendExtension,
];

/// Rules applied to file text after domain substitution, in order.
pub const CLEANUP_RULES: &[RewriteRule] = &[
    RewriteRule::StripVersionQuery(AssetClass::Stylesheet),
    RewriteRule::StripVersionQuery(AssetClass::Script),
    RewriteRule::StripVersionQuery(AssetClass::FontWoff),
    RewriteRule::StripVersionQuery(AssetClass::FontTtf),
    RewriteRule::FixExtensionConfusion(AssetClass::Stylesheet),
    RewriteRule::FixExtensionConfusion(AssetClass::Png),
    RewriteRule::FixExtensionConfusion(AssetClass::Jpeg),
];

/// Final path segment made of word characters and hyphens only.
static EXTENSIONLESS_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)[\w-]+$").unwrap());

// `%3F` is the percent-encoded `?` left behind by the mirror.
static VERSION_QUERY_CSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.css%3Fv=[\w|]+(?:\.css)?").unwrap());
static VERSION_QUERY_JS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.js%3Fv=[\w|]+").unwrap());
static VERSION_QUERY_WOFF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.woff%3Fv=[\w|]+").unwrap());
static VERSION_QUERY_TTF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.ttf%3Fv=[\w|]+").unwrap());

impl RewriteRule {
    pub const fn scope(self) -> RuleScope {
        match self {
            Self::RetargetFeed => RuleScope::AnyLink,
            Self::StripIndex | Self::AppendExtension => RuleScope::SiteRelativeLink,
            Self::StripVersionQuery(_) | Self::FixExtensionConfusion(_) => RuleScope::Text,
        }
    }

    /// Apply the rule, borrowing the input when nothing matches.
    pub fn apply<'a>(self, input: &'a str) -> Cow<'a, str> {
        match self {
            Self::RetargetFeed => retarget_feed(input),
            Self::StripIndex => match input.strip_suffix("/index.html") {
                Some(dir) => Cow::Owned(format!("{dir}/")),
                None => Cow::Borrowed(input),
            },
            Self::AppendExtension => {
                if EXTENSIONLESS_SEGMENT.is_match(input) {
                    Cow::Owned(format!("{input}.{PAGE_EXTENSION}"))
                } else {
                    Cow::Borrowed(input)
                }
            }
            Self::StripVersionQuery(class) => {
                let re = match class {
                    AssetClass::Stylesheet => &VERSION_QUERY_CSS,
                    AssetClass::Script => &VERSION_QUERY_JS,
                    AssetClass::FontWoff => &VERSION_QUERY_WOFF,
                    AssetClass::FontTtf => &VERSION_QUERY_TTF,
                    // Images are never versioned by the theme
                    AssetClass::Png | AssetClass::Jpeg => return Cow::Borrowed(input),
                };
                re.replace_all(input, format!(".{}", class.extension()))
            }
            Self::FixExtensionConfusion(class) => {
                let ext = class.extension();
                let confused = format!("{ext}.{PAGE_EXTENSION}");
                if input.contains(&confused) {
                    Cow::Owned(input.replace(&confused, ext))
                } else {
                    Cow::Borrowed(input)
                }
            }
        }
    }
}

impl fmt::Display for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetargetFeed => write!(f, "retarget-feed"),
            Self::StripIndex => write!(f, "strip-index"),
            Self::AppendExtension => write!(f, "append-extension"),
            Self::StripVersionQuery(class) => write!(f, "strip-version-query({})", class.extension()),
            Self::FixExtensionConfusion(class) => {
                write!(f, "fix-extension-confusion({})", class.extension())
            }
        }
    }
}

/// Point feed links at the converted `index.rss` document.
///
/// A bare `rss` or `rss/` suffix right after a `.` is a file extension, so
/// `feed.rss` is left alone.
fn retarget_feed(href: &str) -> Cow<'_, str> {
    const INDEX: &str = "rss/index.html";

    let lower = href.to_ascii_lowercase();
    let stem = if lower.ends_with(INDEX) {
        &href[..href.len() - INDEX.len()]
    } else {
        let stem_len = if lower.ends_with("rss/") {
            href.len() - 4
        } else if lower.ends_with("rss") {
            href.len() - 3
        } else {
            return Cow::Borrowed(href);
        };
        let stem = &href[..stem_len];
        if stem.ends_with('.') {
            return Cow::Borrowed(href);
        }
        stem
    };
    Cow::Owned(format!("{stem}rss/index.{FEED_EXTENSION}"))
}

/// Apply an ordered rule list to raw text.
pub fn apply_text_rules<'a>(rules: &[RewriteRule], text: &'a str) -> Cow<'a, str> {
    let mut text = Cow::Borrowed(text);
    for rule in rules.iter().filter(|rule| rule.scope() == RuleScope::Text) {
        let changed = match rule.apply(&text) {
            Cow::Owned(changed) => Some(changed),
            Cow::Borrowed(_) => None,
        };
        if let Some(changed) = changed {
            text = Cow::Owned(changed);
        }
    }
    text
}

// ============================================================================
// Link references
// ============================================================================

/// How an href is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    /// Has a scheme (`https:`, `mailto:`) or a protocol-relative `//` prefix.
    Absolute,
    /// Resolved against the mirror's own root.
    SiteRelative,
}

impl LinkClass {
    pub fn of(href: &str) -> Self {
        if href.starts_with("//") || is_external_link(href) {
            Self::Absolute
        } else {
            Self::SiteRelative
        }
    }

    fn admits(self, scope: RuleScope) -> bool {
        match scope {
            RuleScope::AnyLink => true,
            RuleScope::SiteRelativeLink => self == Self::SiteRelative,
            RuleScope::Text => false,
        }
    }
}

/// An `href` found in a page, with its rewritten form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub original: String,
    pub class: LinkClass,
    pub rewritten: String,
}

impl LinkRef {
    /// Classify `href` and run [`LINK_RULES`] over it.
    pub fn rewrite(href: &str) -> Self {
        let class = LinkClass::of(href);
        let rewritten = LINK_RULES
            .iter()
            .filter(|rule| class.admits(rule.scope()))
            .fold(href.to_string(), |acc, rule| rule.apply(&acc).into_owned());

        Self {
            original: href.to_string(),
            class,
            rewritten,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.original != self.rewritten
    }
}
