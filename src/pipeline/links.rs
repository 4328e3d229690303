//! Link rewriting for mirrored pages.
//!
//! Pages are streamed through `quick_xml` and copied byte-for-byte from the
//! source. Only an `<a>` or `<link>` start tag whose `href` changes under
//! [`LINK_RULES`](super::rules::LINK_RULES) is re-emitted.
//!
//! Mirrored HTML is rarely well-formed XML, so the reader is configured not
//! to match end tags, `<script>`/`<style>`/`<textarea>`/`<title>` bodies are
//! skipped as raw text, a `<` that does not open a tag name is copied as text,
//! and after a syntax error reading resumes just past the offending byte.

use quick_xml::{
    Reader,
    escape::{escape, resolve_html5_entity, unescape, unescape_with},
    events::{BytesStart, Event, attributes::Attribute},
};
use rayon::prelude::*;
use std::path::Path;

use super::{
    PipelineError,
    rules::LinkRef,
    tree::{Dialect, MirrorTree, write_if_changed},
};
use crate::{debug, logger::ProgressLine};

const HTML_DOCTYPE: &str = "<!DOCTYPE html>\n";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const BOM: char = '\u{feff}';

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Outcome of rewriting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    pub links: Vec<LinkRef>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    /// Pages visited.
    pub scanned: usize,
    /// Pages whose bytes changed.
    pub pages: usize,
    /// Hrefs rewritten across all pages.
    pub links: usize,
    /// Pages left alone because they are not UTF-8.
    pub skipped: usize,
}

/// Rewrite the links of every `*.html` page in the tree, in place.
pub fn fix_links(tree: &MirrorTree) -> Result<LinkReport, PipelineError> {
    let pages = tree.pages()?;
    let progress = ProgressLine::new("links", pages.len());

    let outcomes = pages
        .par_iter()
        .map(|path| {
            let outcome = fix_page(tree, path);
            progress.inc();
            outcome
        })
        .collect::<Result<Vec<_>, _>>();
    progress.finish();

    Ok(outcomes?
        .into_iter()
        .fold(LinkReport::default(), |mut report, outcome| {
            report.scanned += 1;
            match outcome {
                PageOutcome::Skipped => report.skipped += 1,
                PageOutcome::Done { changed, links } => {
                    report.pages += usize::from(changed);
                    report.links += links;
                }
            }
            report
        }))
}

enum PageOutcome {
    Skipped,
    Done { changed: bool, links: usize },
}

fn fix_page(tree: &MirrorTree, path: &Path) -> Result<PageOutcome, PipelineError> {
    let page = tree.read_page(path)?;
    let Ok(text) = std::str::from_utf8(&page.content) else {
        debug!("links"; "skipping undecodable {}", page.path.display());
        return Ok(PageOutcome::Skipped);
    };

    let rewritten = rewrite_document(text, page.dialect);
    let changed = write_if_changed(path, &page.content, rewritten.text.as_bytes())?;
    if changed {
        debug!("links"; "fixed {}", page.path.display());
    }
    Ok(PageOutcome::Done {
        changed,
        links: rewritten.links.len(),
    })
}

/// Rewrite a whole document and normalize its leading declaration.
///
/// An empty document stays empty. A leading byte order mark is kept in front.
pub fn rewrite_document(text: &str, dialect: Dialect) -> Rewritten {
    let (bom, text) = match text.strip_prefix(BOM) {
        Some(text) => ("\u{feff}", text),
        None => ("", text),
    };
    if text.is_empty() && bom.is_empty() {
        return Rewritten {
            text: String::new(),
            links: Vec::new(),
        };
    }

    let mut links = Vec::new();
    let text = match dialect {
        Dialect::Html => {
            let body = rewrite_markup(strip_doctype(text), dialect, &mut links);
            format!("{bom}{HTML_DOCTYPE}{body}")
        }
        Dialect::Xml => {
            let body = rewrite_markup(text, dialect, &mut links);
            if text.trim_start().starts_with("<?xml") {
                format!("{bom}{body}")
            } else {
                format!("{bom}{XML_DECLARATION}{body}")
            }
        }
    };
    Rewritten { text, links }
}

/// Drop a leading `<!DOCTYPE …>` and the line break after it.
fn strip_doctype(text: &str) -> &str {
    let trimmed = text.trim_start();
    let is_doctype = trimmed
        .get(..9)
        .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"));
    if !is_doctype {
        return text;
    }
    let Some(close) = trimmed.find('>') else {
        return text;
    };
    let rest = &trimmed[close + 1..];
    rest.strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest)
}

/// Copy `src` to a new string, re-emitting only tags whose href changed.
fn rewrite_markup(src: &str, dialect: Dialect, links: &mut Vec<LinkRef>) -> String {
    let mut out = String::with_capacity(src.len());
    // Offset of the slice the current reader was started on
    let mut base = 0;

    'restart: while base < src.len() {
        let rest = &src[base..];
        // The reader drops a leading mark from its offsets
        if rest.starts_with(BOM) {
            out.push(BOM);
            base += BOM.len_utf8();
            continue;
        }
        let mut reader = Reader::from_str(rest);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        // Bytes of `rest` already written to `out`
        let mut copied = 0;
        loop {
            let start = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    let at = (reader.error_position() as usize).max(copied);
                    debug!("links"; "markup error at byte {}: {e}", base + at);
                    let resume = next_char_boundary(rest, at + 1);
                    out.push_str(&rest[copied..resume]);
                    base += resume;
                    continue 'restart;
                }
            };
            let end = reader.buffer_position() as usize;

            let (tag, empty) = match &event {
                Event::Eof => {
                    out.push_str(&rest[copied..]);
                    break 'restart;
                }
                Event::Start(tag) => (tag, false),
                Event::Empty(tag) => (tag, true),
                _ => continue,
            };

            if !opens_tag_name(tag, dialect) {
                out.push_str(&rest[copied..=start]);
                base += start + 1;
                continue 'restart;
            }

            if let Some(rebuilt) = rewrite_tag(tag, empty, dialect, links) {
                out.push_str(&rest[copied..start]);
                out.push_str(&rebuilt);
                copied = end;
            }

            if dialect == Dialect::Html && !empty {
                if let Some(name) = raw_text_element(tag) {
                    let close = find_ignore_case(&rest[end..], &format!("</{name}"));
                    match close {
                        Some(offset) => {
                            out.push_str(&rest[copied..end + offset]);
                            base += end + offset;
                            continue 'restart;
                        }
                        None => {
                            out.push_str(&rest[copied..]);
                            break 'restart;
                        }
                    }
                }
            }
        }
    }
    out
}

/// Rebuild an `<a>`/`<link>` tag when its href is rewritten.
///
/// Tags with malformed attributes are left alone.
fn rewrite_tag(
    tag: &BytesStart<'_>,
    empty: bool,
    dialect: Dialect,
    links: &mut Vec<LinkRef>,
) -> Option<String> {
    let local = tag.local_name();
    let is_link = local.as_ref().eq_ignore_ascii_case(b"a")
        || local.as_ref().eq_ignore_ascii_case(b"link");
    if !is_link {
        return None;
    }

    let attrs: Vec<Attribute<'_>> = match dialect {
        Dialect::Html => tag.html_attributes().collect::<Result<Vec<_>, _>>(),
        Dialect::Xml => tag.attributes().collect::<Result<Vec<_>, _>>(),
    }
    .ok()?;

    let href_at = attrs
        .iter()
        .position(|attr| attr.key.as_ref().eq_ignore_ascii_case(b"href"))?;
    let raw = std::str::from_utf8(&attrs[href_at].value).ok()?;
    // An href that does not unescape cleanly is left as written
    let href = match dialect {
        Dialect::Html => unescape_with(raw, resolve_html5_entity),
        Dialect::Xml => unescape(raw),
    }
    .ok()?;

    let link = LinkRef::rewrite(&href);
    if !link.is_changed() {
        return None;
    }

    let mut rebuilt = String::from("<");
    rebuilt.push_str(std::str::from_utf8(tag.name().as_ref()).ok()?);
    for (i, attr) in attrs.iter().enumerate() {
        rebuilt.push(' ');
        rebuilt.push_str(std::str::from_utf8(attr.key.as_ref()).ok()?);
        rebuilt.push_str("=\"");
        if i == href_at {
            rebuilt.push_str(&escape(&link.rewritten));
        } else {
            // Raw value is already escaped, only the quoting may change
            let value = std::str::from_utf8(&attr.value).ok()?;
            rebuilt.push_str(&value.replace('"', "&quot;"));
        }
        rebuilt.push('"');
    }
    rebuilt.push_str(if empty { "/>" } else { ">" });

    debug!("links"; "{} => {}", link.original, link.rewritten);
    links.push(link);
    Some(rebuilt)
}

/// Whether the tag's `<` is followed by a name, as opposed to a stray `<` in text.
fn opens_tag_name(tag: &BytesStart<'_>, dialect: Dialect) -> bool {
    tag.name().as_ref().first().is_some_and(|&b| {
        b.is_ascii_alphabetic() || (dialect == Dialect::Xml && matches!(b, b'_' | b':'))
    })
}

fn raw_text_element(tag: &BytesStart<'_>) -> Option<&'static str> {
    let local = tag.local_name();
    RAW_TEXT_ELEMENTS
        .iter()
        .find(|name| local.as_ref().eq_ignore_ascii_case(name.as_bytes()))
        .copied()
}

/// Byte offset of an ASCII `needle` in `haystack`, ignoring ASCII case.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn next_char_boundary(text: &str, mut at: usize) -> usize {
    at = at.min(text.len());
    while !text.is_char_boundary(at) {
        at += 1;
    }
    at
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn html(text: &str) -> String {
        rewrite_document(text, Dialect::Html).text
    }

    #[test]
    fn test_rewrites_site_relative_hrefs() {
        let out = html(r#"<a href="/about/index.html">About</a> <a href="tags">Tags</a>"#);
        assert_eq!(
            out,
            "<!DOCTYPE html>\n<a href=\"/about/\">About</a> <a href=\"tags.html\">Tags</a>"
        );
    }

    #[test]
    fn test_untouched_markup_preserved() {
        let src = "<!DOCTYPE html>\n<html><head><meta charset=utf-8>\
                   <link rel='stylesheet' href='/screen.css'></head>\
                   <body><p class=x>a &amp; b<br></p><img src=\"a.png\">\
                   <a href=\"https://x.io/about\">x</a></body></html>";
        assert_eq!(html(src), src);
    }

    #[test]
    fn test_rebuilt_tag_keeps_other_attributes() {
        let out = html(r#"<link rel="alternate" type="application/rss+xml" href="/rss/">"#);
        assert_eq!(
            out,
            "<!DOCTYPE html>\n<link rel=\"alternate\" type=\"application/rss+xml\" href=\"/rss/index.rss\">"
        );

        let out = html("<a class='nav \"x\"' href=about/>");
        assert_eq!(out, "<!DOCTYPE html>\n<a class=\"nav &quot;x&quot;\" href=\"about.html\"/>");
    }

    #[test]
    fn test_escaped_href() {
        let out = html(r#"<a href="/a?b=1&amp;c=2">x</a><a href="/q?a&amp;b/index.html">y</a>"#);
        assert_eq!(
            out,
            "<!DOCTYPE html>\n<a href=\"/a?b=1&amp;c=2\">x</a><a href=\"/q?a&amp;b/\">y</a>"
        );
    }

    #[test]
    fn test_doctype_replaced() {
        assert_eq!(
            html("<!doctype HTML PUBLIC \"x\">\r\n<html></html>"),
            "<!DOCTYPE html>\n<html></html>"
        );
        assert_eq!(html("<html></html>"), "<!DOCTYPE html>\n<html></html>");
    }

    #[test]
    fn test_script_body_not_parsed() {
        let src = "<script>if (a < b && c) { document.write('<a href=\"x\">'); }</script>\
                   <a href=\"/x/index.html\">x</a>";
        assert_eq!(
            html(src),
            "<!DOCTYPE html>\n<script>if (a < b && c) { document.write('<a href=\"x\">'); }</script>\
             <a href=\"/x/\">x</a>"
        );
    }

    #[test]
    fn test_recovers_after_markup_error() {
        let src = "<p>1 < 2</p><a href=\"/about\">a</a>";
        assert_eq!(html(src), "<!DOCTYPE html>\n<p>1 < 2</p><a href=\"/about.html\">a</a>");
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        let src = "<p>a < b <a href=\"/about\">x</a></p>";
        assert_eq!(html(src), "<!DOCTYPE html>\n<p>a < b <a href=\"/about.html\">x</a></p>");

        let src = "<p>x <= y</p><a href=\"tags\">t</a>";
        assert_eq!(html(src), "<!DOCTYPE html>\n<p>x <= y</p><a href=\"tags.html\">t</a>");
    }

    #[test]
    fn test_byte_order_mark_kept() {
        let out = html("\u{feff}<!DOCTYPE html>\n<a href=\"/about\">x</a>");
        assert_eq!(out, "\u{feff}<!DOCTYPE html>\n<a href=\"/about.html\">x</a>");
        assert_eq!(html(&out), out);

        let feed = "\u{feff}<?xml version=\"1.0\"?><rss><atom:link href=\"/rss/\"/></rss>";
        assert_eq!(
            rewrite_document(feed, Dialect::Xml).text,
            "\u{feff}<?xml version=\"1.0\"?><rss><atom:link href=\"/rss/index.rss\"/></rss>"
        );
    }

    #[test]
    fn test_named_entity_in_href() {
        assert_eq!(
            html("<a href=\"/caf&eacute;/index.html\">x</a>"),
            "<!DOCTYPE html>\n<a href=\"/café/\">x</a>"
        );

        // Unknown entities are not guessed at
        let src = "<a href=\"/x&bogus;/index.html\">x</a>";
        assert_eq!(html(src), format!("{HTML_DOCTYPE}{src}"));

        let feed = "<?xml version=\"1.0\"?><link href=\"/caf&eacute;/rss\"/>";
        assert_eq!(rewrite_document(feed, Dialect::Xml).text, feed);
    }

    #[test]
    fn test_rcdata_body_not_parsed() {
        let src = "<title>a <a href=\"b\"></title>\
                   <textarea><a href=\"/about\">x</a></textarea><a href=\"/c\">c</a>";
        assert_eq!(
            html(src),
            "<!DOCTYPE html>\n<title>a <a href=\"b\"></title>\
             <textarea><a href=\"/about\">x</a></textarea><a href=\"/c.html\">c</a>"
        );
    }

    #[test]
    fn test_link_without_href() {
        let src = "<a name=\"top\"></a><link rel=\"icon\">";
        assert_eq!(html(src), format!("{HTML_DOCTYPE}{src}"));
    }

    #[test]
    fn test_idempotent() {
        let src = "<html><a href=\"/about/index.html\">a</a><a href=\"/tag/x/rss\">r</a></html>";
        let once = html(src);
        assert_eq!(html(&once), once);
    }

    #[test]
    fn test_xml_dialect() {
        let feed = "<rss><channel><atom:link href=\"http://localhost:2368/rss/\" rel=\"self\"/>\
                    <link>http://localhost:2368/</link></channel></rss>";
        let out = rewrite_document(feed, Dialect::Xml);
        assert_eq!(out.links.len(), 1);
        assert_eq!(
            out.text,
            format!(
                "{XML_DECLARATION}<rss><channel><atom:link href=\"http://localhost:2368/rss/index.rss\" rel=\"self\"/>\
                 <link>http://localhost:2368/</link></channel></rss>"
            )
        );

        let declared = "<?xml version=\"1.0\"?><rss/>";
        assert_eq!(rewrite_document(declared, Dialect::Xml).text, declared);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(html(""), "");
        assert_eq!(rewrite_document("", Dialect::Xml).text, "");
    }

    #[test]
    fn test_fix_links_over_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("rss")).unwrap();
        fs::write(dir.path().join("index.html"), "<a href=\"about\">a</a>").unwrap();
        fs::write(dir.path().join("rss/index.html"), "<rss/>").unwrap();
        fs::write(dir.path().join("binary.html"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("screen.css"), "a{}").unwrap();

        let tree = MirrorTree::open(dir.path()).unwrap();
        let report = fix_links(&tree).unwrap();

        assert_eq!(report, LinkReport {
            scanned: 3,
            pages: 2,
            links: 1,
            skipped: 1,
        });
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<!DOCTYPE html>\n<a href=\"about.html\">a</a>"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("rss/index.html")).unwrap(),
            format!("{XML_DECLARATION}<rss/>")
        );
        assert_eq!(fs::read(dir.path().join("binary.html")).unwrap(), [0xff, 0xfe, 0x00]);

        // Second run changes nothing
        let again = fix_links(&tree).unwrap();
        assert_eq!(again.pages, 0);
    }
}
