//! Sitemap XML parsing
//!
//! Element names are matched on their local part, so any namespace prefix or
//! URI is accepted.

use crate::SitemapError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// A sitemap document classified by role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapNode {
    /// Ordered child sitemap locations
    Index(Vec<String>),
    /// Ordered page URLs
    Leaf(Vec<String>),
}

/// Every `<loc>` found in a sitemap document, grouped by parent element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// `<loc>` children of `<sitemap>` elements
    pub sitemaps: Vec<String>,
    /// `<loc>` children of `<url>` elements
    pub urls: Vec<String>,
    /// Every `<loc>` in the document, whatever its parent
    pub locs: Vec<String>,
}

impl SitemapDocument {
    /// A document is an index when it has at least one `<sitemap>` entry
    pub fn is_index(&self) -> bool {
        !self.sitemaps.is_empty()
    }

    /// Whether the document gives no structural hint of its role
    pub fn is_ambiguous(&self) -> bool {
        self.sitemaps.is_empty() && self.urls.is_empty() && !self.locs.is_empty()
    }

    /// Classifies the document
    ///
    /// `<sitemap>` entries make an index. Otherwise it is a leaf listing its
    /// `<url>` entries, or every `<loc>` when there are none.
    pub fn node(&self) -> SitemapNode {
        if self.is_index() {
            SitemapNode::Index(self.sitemaps.clone())
        } else {
            SitemapNode::Leaf(self.page_entries())
        }
    }

    /// Locations to use when the document was fetched as an index
    ///
    /// Without `<sitemap>` elements every `<loc>` in the document is used.
    pub fn index_entries(&self) -> Vec<String> {
        if self.is_index() {
            self.sitemaps.clone()
        } else {
            self.locs.clone()
        }
    }

    /// Locations to use when the document was fetched as a leaf
    pub fn page_entries(&self) -> Vec<String> {
        if self.urls.is_empty() {
            self.locs.clone()
        } else {
            self.urls.clone()
        }
    }
}

/// Parses a sitemap or sitemap index
///
/// # Returns
///
/// * `Ok(SitemapDocument)` - Locations in document order
/// * `Err(SitemapError::Empty)` - Blank input
/// * `Err(SitemapError::Xml)` - Malformed XML, no root element, or unclosed elements
///
/// # Example
///
/// ```
/// use shelf_sweep::sitemap::{parse_sitemap, SitemapNode};
///
/// let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
///   <sitemap><loc>https://shop.com/sitemap_products_1.xml</loc></sitemap>
/// </sitemapindex>"#;
/// let doc = parse_sitemap(xml).unwrap();
/// assert_eq!(
///     doc.node(),
///     SitemapNode::Index(vec!["https://shop.com/sitemap_products_1.xml".to_string()])
/// );
/// ```
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, SitemapError> {
    if xml.trim().is_empty() {
        return Err(SitemapError::Empty);
    }

    let mut reader = Reader::from_str(xml.trim_start());
    reader.config_mut().trim_text(true);

    let mut doc = SitemapDocument::default();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut current_loc = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                saw_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if name == "loc" {
                    current_loc.clear();
                }
                stack.push(name);
            }
            Ok(Event::Empty(_)) => {
                saw_root = true;
            }
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    return Err(xml_error(&reader, "unexpected closing tag"));
                };
                if name == "loc" {
                    let loc = current_loc.trim().to_string();
                    if !loc.is_empty() {
                        match stack.last().map(String::as_str) {
                            Some("sitemap") => doc.sitemaps.push(loc.clone()),
                            Some("url") => doc.urls.push(loc.clone()),
                            _ => {}
                        }
                        doc.locs.push(loc);
                    }
                    current_loc.clear();
                }
            }
            Ok(Event::Text(e)) => {
                if in_loc(&stack) {
                    let text = e
                        .unescape()
                        .map_err(|err| xml_error(&reader, &err.to_string()))?;
                    current_loc.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if in_loc(&stack) {
                    current_loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(&reader, &e.to_string())),
            _ => {}
        }
    }

    if !saw_root {
        return Err(xml_error(&reader, "no root element"));
    }

    if !stack.is_empty() {
        return Err(xml_error(
            &reader,
            &format!("unexpected end of document inside <{}>", stack.join("/")),
        ));
    }

    Ok(doc)
}

fn in_loc(stack: &[String]) -> bool {
    stack.last().map(String::as_str) == Some("loc")
}

fn xml_error(reader: &Reader<&[u8]>, message: &str) -> SitemapError {
    SitemapError::Xml {
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}
