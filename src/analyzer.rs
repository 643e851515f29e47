use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// A character filter receives the original text and transforms it, for
/// instance stripping HTML down to what a reader would see.
pub trait CharacterFilter: Send + Sync {
    fn filter(&self, text: &str) -> String;
}

/// Reduces an HTML document to the text a browser would render.
/// Script, style, noscript and template content plus comments are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisibleTextFilter;

impl VisibleTextFilter {
    pub fn get_dom(html: &str) -> Option<RcDom> {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut std::io::Cursor::new(html))
            .ok()
    }

    pub fn is_hidden(local: &LocalName) -> bool {
        matches!(&**local, "script" | "style" | "noscript" | "template")
    }

    pub fn is_block_like(local: &LocalName) -> bool {
        matches!(
            &**local,
            "p" | "div" | "section" | "article" | "li" | "ul" | "ol" | "header" | "footer"
                | "tr" | "td" | "th" | "br" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        )
    }

    pub fn walk_html(handle: &Handle, out: &mut String) {
        let node = handle;
        match &node.data {
            NodeData::Text { contents } => {
                let s = contents.borrow();
                let s = s.trim();
                if s.is_empty() {
                    return;
                }
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(s);
            }
            NodeData::Element { name, .. } => {
                let local = &name.local;
                if Self::is_hidden(local) {
                    return;
                }
                let block = Self::is_block_like(local);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                for child in node.children.borrow().iter() {
                    Self::walk_html(child, out);
                }
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => {}
            _ => {
                for child in node.children.borrow().iter() {
                    Self::walk_html(child, out);
                }
            }
        }
    }

    pub fn compress_whitespaces(text: &str) -> String {
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl CharacterFilter for VisibleTextFilter {
    fn filter(&self, html: &str) -> String {
        let Some(dom) = Self::get_dom(html) else {
            return String::new();
        };
        let mut out = String::new();
        Self::walk_html(&dom.document, &mut out);
        Self::compress_whitespaces(&out)
    }
}

/// Convenience wrapper around [`VisibleTextFilter`].
pub fn visible_text(html: &str) -> String {
    VisibleTextFilter.filter(html)
}
