//! Minimal, forgiving HTML tree.
//!
//! Tracker pages are server-rendered PHP templates: unclosed `<td>`s,
//! stray end tags, inline scripts. This module builds an arena tree that
//! tolerates all of that and offers the handful of queries the site
//! handlers need (by name / class / attribute predicate, text content,
//! parent and sibling navigation).

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ATTR_RE: Regex = Regex::new(
        r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+)))?"#
    )
    .expect("attribute regex");
    static ref ENTITY_RE: Regex =
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("entity regex");
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Elements whose text is kept apart from their neighbours.
const BLOCK_ELEMENTS: &[&str] = &[
    "br", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "p", "table", "td", "th", "tr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

const ROOT: usize = 0;

/// Open elements deeper than this become leaves of the deepest open one.
const MAX_DEPTH: usize = 512;

// ── Arena ────────────────────────────────────────────────────────────

#[derive(Debug)]
enum NodeKind {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    /// Script / style bodies: kept, but excluded from `text()`.
    RawText(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A parsed HTML document.
pub struct Document {
    nodes: Vec<Node>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl Document {
    /// Parse an HTML string. Never fails; malformed markup degrades to text.
    pub fn parse(html: &str) -> Self {
        Parser::new(html).run()
    }

    /// The synthetic root element containing the whole document.
    pub fn root(&self) -> Element<'_> {
        Element { doc: self, id: ROOT }
    }

    pub fn find(&self, pred: impl Fn(&Element<'_>) -> bool) -> Option<Element<'_>> {
        self.root().find(pred)
    }

    pub fn find_all(&self, pred: impl Fn(&Element<'_>) -> bool) -> Vec<Element<'_>> {
        self.root().find_all(pred)
    }

    /// Element with the given `id` attribute.
    pub fn by_id(&self, id: &str) -> Option<Element<'_>> {
        self.find(|e| e.attr("id") == Some(id))
    }

    /// Whole-document text, whitespace-collapsed.
    pub fn text(&self) -> String {
        self.root().text()
    }

    /// Innermost element owning a text node that matches `re`, in document
    /// order.
    pub fn element_with_text(&self, re: &Regex) -> Option<Element<'_>> {
        self.nodes.iter().find_map(|node| match (&node.kind, node.parent) {
            (NodeKind::Text(t), Some(parent)) if re.is_match(t) => Some(Element {
                doc: self,
                id: parent,
            }),
            _ => None,
        })
    }

    fn push(&mut self, parent: usize, kind: NodeKind) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    fn name_of(&self, id: usize) -> &str {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element { name, .. }) => name,
            _ => "",
        }
    }
}

// ── Element handle ───────────────────────────────────────────────────

/// Borrowed handle to an element node.
#[derive(Clone, Copy)]
pub struct Element<'a> {
    doc: &'a Document,
    id: usize,
}

impl PartialEq for Element<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.doc, other.doc)
    }
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (k, v) in self.attrs() {
            write!(f, " {k}=\"{v}\"")?;
        }
        write!(f, ">")
    }
}

impl<'a> Element<'a> {
    fn node(&self) -> &'a Node {
        &self.doc.nodes[self.id]
    }

    fn attrs(&self) -> &'a [(String, String)] {
        match &self.node().kind {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Lowercase tag name.
    pub fn name(&self) -> &'a str {
        self.doc.name_of(self.id)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name() == name
    }

    pub fn attr(&self, key: &str) -> Option<&'a str> {
        self.attrs()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs().iter().any(|(k, _)| k == key)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|x| x == class))
    }

    /// True if any class contains `fragment` (`grid-cols-` matches `grid-cols-6`).
    pub fn class_contains(&self, fragment: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|x| x.contains(fragment)))
    }

    pub fn attr_contains(&self, key: &str, fragment: &str) -> bool {
        self.attr(key).is_some_and(|v| v.contains(fragment))
    }

    /// Descendant text, whitespace-collapsed and trimmed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(self.id, &mut raw);
        collapse_whitespace(&raw)
    }

    fn collect_text(&self, id: usize, out: &mut String) {
        enum Step {
            Enter(usize),
            Gap,
        }
        let mut stack: Vec<Step> = self.doc.nodes[id]
            .children
            .iter()
            .rev()
            .map(|&c| Step::Enter(c))
            .collect();
        while let Some(step) = stack.pop() {
            let Step::Enter(child) = step else {
                out.push(' ');
                continue;
            };
            let node = &self.doc.nodes[child];
            match &node.kind {
                NodeKind::Text(t) => out.push_str(t),
                NodeKind::Element { name, .. } => {
                    let block = BLOCK_ELEMENTS.contains(&name.as_str());
                    if block {
                        out.push(' ');
                        stack.push(Step::Gap);
                    }
                    stack.extend(node.children.iter().rev().map(|&c| Step::Enter(c)));
                }
                NodeKind::RawText(_) => {}
            }
        }
    }

    /// Text of direct text-node children only.
    pub fn own_text(&self) -> String {
        let raw: String = self
            .node()
            .children
            .iter()
            .filter_map(|&c| match &self.doc.nodes[c].kind {
                NodeKind::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        collapse_whitespace(&raw)
    }

    /// Direct element children.
    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        let doc = self.doc;
        doc.nodes[self.id]
            .children
            .iter()
            .copied()
            .filter(move |&c| matches!(doc.nodes[c].kind, NodeKind::Element { .. }))
            .map(move |id| Element { doc, id })
    }

    /// All descendant elements in document order.
    pub fn descendants(&self) -> Vec<Element<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.node().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.doc.nodes[id];
            if matches!(node.kind, NodeKind::Element { .. }) {
                out.push(Element { doc: self.doc, id });
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn find(&self, pred: impl Fn(&Element<'a>) -> bool) -> Option<Element<'a>> {
        self.descendants().into_iter().find(|e| pred(e))
    }

    pub fn find_all(&self, pred: impl Fn(&Element<'a>) -> bool) -> Vec<Element<'a>> {
        self.descendants().into_iter().filter(|e| pred(e)).collect()
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.node()
            .parent
            .map(|id| Element { doc: self.doc, id })
    }

    /// Nearest ancestor satisfying `pred`.
    pub fn closest(&self, pred: impl Fn(&Element<'a>) -> bool) -> Option<Element<'a>> {
        let mut cur = self.parent();
        while let Some(e) = cur {
            if e.id != ROOT && pred(&e) {
                return Some(e);
            }
            cur = e.parent();
        }
        None
    }

    /// Following element sibling.
    pub fn next_sibling(&self) -> Option<Element<'a>> {
        self.following_siblings().into_iter().next()
    }

    /// All following element siblings, nearest first.
    pub fn following_siblings(&self) -> Vec<Element<'a>> {
        let Some(parent) = self.parent() else {
            return Vec::new();
        };
        parent
            .children()
            .skip_while(|e| e.id != self.id)
            .skip(1)
            .collect()
    }

    /// Text between this element's end and the next element sibling.
    pub fn trailing_text(&self) -> String {
        let Some(parent) = self.node().parent else {
            return String::new();
        };
        let siblings = &self.doc.nodes[parent].children;
        let mut raw = String::new();
        for &c in siblings.iter().skip_while(|&&c| c != self.id).skip(1) {
            match &self.doc.nodes[c].kind {
                NodeKind::Text(t) => raw.push_str(t),
                _ => break,
            }
        }
        collapse_whitespace(&raw)
    }
}

// ── Parser ───────────────────────────────────────────────────────────

struct Parser<'h> {
    html: &'h str,
    pos: usize,
    doc: Document,
    stack: Vec<usize>,
}

impl<'h> Parser<'h> {
    fn new(html: &'h str) -> Self {
        let root = Node {
            kind: NodeKind::Element {
                name: "#document".into(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            html,
            pos: 0,
            doc: Document { nodes: vec![root] },
            stack: vec![ROOT],
        }
    }

    fn top(&self) -> usize {
        self.stack.last().copied().unwrap_or(ROOT)
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let parent = self.top();
        self.doc
            .push(parent, NodeKind::Text(decode_entities(raw)));
    }

    fn run(mut self) -> Document {
        let html = self.html;
        while self.pos < html.len() {
            let rest = &html[self.pos..];
            let Some(lt) = rest.find('<') else {
                self.text(rest);
                break;
            };
            self.text(&rest[..lt]);
            self.pos += lt;
            let rest = &html[self.pos..];

            if rest.starts_with("<!--") {
                self.skip_past(rest.find("-->").map(|e| e + 3));
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(rest.find('>').map(|e| e + 1));
            } else if let Some(after) = rest.strip_prefix("</") {
                let name: String = after
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                self.skip_past(rest.find('>').map(|e| e + 1));
                self.close(&name);
            } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.open_tag();
            } else {
                self.text("<");
                self.pos += 1;
            }
        }
        self.doc
    }

    fn skip_past(&mut self, offset: Option<usize>) {
        self.pos = offset.map_or(self.html.len(), |o| self.pos + o);
    }

    /// Index of the `>` ending the tag that starts at `self.pos`,
    /// ignoring `>` inside quoted attribute values.
    fn tag_end(&self) -> usize {
        let mut quote: Option<char> = None;
        for (i, c) in self.html[self.pos..].char_indices() {
            match (quote, c) {
                (None, '"' | '\'') => quote = Some(c),
                (Some(q), c) if c == q => quote = None,
                (None, '>') => return self.pos + i,
                _ => {}
            }
        }
        self.html.len()
    }

    fn open_tag(&mut self) {
        let end = self.tag_end();
        let inner = self.html[self.pos + 1..end].trim_end();
        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let name_len = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        let name = inner[..name_len].to_ascii_lowercase();
        let attrs = parse_attrs(&inner[name_len..]);
        self.pos = (end + 1).min(self.html.len());

        self.implicit_close(&name);
        let parent = self.top();
        let id = self.doc.push(
            parent,
            NodeKind::Element {
                name: name.clone(),
                attrs,
            },
        );

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let rest = &self.html[self.pos..];
            let close = format!("</{name}");
            let body_len = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
            let body = &rest[..body_len];
            if name == "textarea" {
                self.doc.push(id, NodeKind::Text(decode_entities(body)));
            } else {
                self.doc.push(id, NodeKind::RawText(body.to_string()));
            }
            self.pos += body_len;
            let rest = &self.html[self.pos..];
            self.skip_past(rest.find('>').map(|e| e + 1));
            return;
        }

        if !self_closing
            && !VOID_ELEMENTS.contains(&name.as_str())
            && self.stack.len() < MAX_DEPTH
        {
            self.stack.push(id);
        }
    }

    /// Position in the stack of the nearest open element named in `stop_at`.
    fn nearest(&self, stop_at: &[&str]) -> Option<(usize, &str)> {
        self.stack
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .map(|(pos, &id)| (pos, self.doc.name_of(id)))
            .find(|(_, n)| stop_at.contains(n))
    }

    /// Close elements whose end tag HTML lets authors omit.
    fn implicit_close(&mut self, opening: &str) {
        let (scope, closes): (&[&str], &[&str]) = match opening {
            "tr" => (&["tr", "td", "th", "thead", "tbody", "tfoot", "table"], &["tr", "td", "th"]),
            "td" | "th" => (&["td", "th", "tr", "table"], &["td", "th"]),
            "thead" | "tbody" | "tfoot" => (
                &["thead", "tbody", "tfoot", "tr", "td", "th", "table"],
                &["thead", "tbody", "tfoot", "tr", "td", "th"],
            ),
            "li" => (&["li", "ul", "ol"], &["li"]),
            "option" => (&["option", "select"], &["option"]),
            "p" => (&["p", "div", "td", "th", "table"], &["p"]),
            _ => return,
        };
        // Walk outward while the nearest scope element is closable.
        while let Some((pos, name)) = self.nearest(scope) {
            if !closes.contains(&name) {
                break;
            }
            self.stack.truncate(pos);
        }
    }

    fn close(&mut self, name: &str) {
        if let Some((pos, _)) = self.nearest(&[name]) {
            self.stack.truncate(pos);
        }
    }
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|c| {
            let key = c.get(1)?.as_str().to_ascii_lowercase();
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map_or(String::new(), |m| decode_entities(m.as_str()));
            Some((key, value))
        })
        .collect()
}

/// Decode the entities that show up in tracker templates.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    ENTITY_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let ent = &caps[1];
            let decoded = if let Some(hex) = ent.strip_prefix("#x").or_else(|| ent.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = ent.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match ent {
                    "nbsp" | "ensp" | "emsp" => Some(' '),
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "yen" => Some('¥'),
                    "middot" => Some('·'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

/// Collapse runs of whitespace (including U+00A0 and U+3000) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unclosed_cells_nest_correctly() {
        let doc = Document::parse(
            "<table border=1><tr><td class=colhead>用户名<td>邮箱\
             <tr class=rowfollow><td><a href='userdetails.php?id=3&amp;x=1'>bob</a><td>b@x.org</table>",
        );
        let table = doc.find(|e| e.is("table")).unwrap();
        assert_eq!(table.attr("border"), Some("1"));
        let rows: Vec<_> = table.find_all(|e| e.is("tr"));
        assert_eq!(rows.len(), 2);
        let cells: Vec<_> = rows[1].children().collect();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].text(), "bob");
        assert_eq!(cells[1].text(), "b@x.org");
        let link = cells[0].find(|e| e.is("a")).unwrap();
        assert_eq!(link.attr("href"), Some("userdetails.php?id=3&x=1"));
        assert!(rows[1].has_class("rowfollow"));
    }

    #[test]
    fn scripts_and_comments_do_not_leak_into_text() {
        let doc = Document::parse(
            "<div id=info_block><!-- <b>hidden</b> --><script>var s = '<td>';</script>\
             邀请&nbsp;[<a href=\"invite.php?id=1\">发送</a>]: 3(1)</div>",
        );
        let info = doc.by_id("info_block").unwrap();
        assert_eq!(info.text(), "邀请 [发送]: 3(1)");
        let link = info.find(|e| e.is("a")).unwrap();
        assert_eq!(link.trailing_text(), "]: 3(1)");
    }

    #[test]
    fn quoted_gt_and_void_elements() {
        let doc = Document::parse(
            r#"<form action="takeinvite.php?a=1>2"><input type="submit" value="邀请其他人" disabled><img src=x.png alt="Disabled"></form><p>after"#,
        );
        let form = doc.find(|e| e.is("form")).unwrap();
        assert_eq!(form.attr("action"), Some("takeinvite.php?a=1>2"));
        let input = form.find(|e| e.is("input")).unwrap();
        assert!(input.has_attr("disabled"));
        assert_eq!(input.next_sibling().unwrap().attr("alt"), Some("Disabled"));
        let p = doc.find(|e| e.is("p")).unwrap();
        assert_eq!(p.parent().unwrap().name(), "#document");
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let doc = Document::parse("<div><span>a</b></span></td>b</div>");
        let div = doc.find(|e| e.is("div")).unwrap();
        assert_eq!(div.text(), "ab");
        assert_eq!(div.children().count(), 1);
    }

    #[test]
    fn closest_and_element_with_text() {
        let doc = Document::parse(
            "<table><tr><td><h2>对不起</h2><p>只有 Power User 及以上等级才能发送邀请</p></td></tr></table>",
        );
        let re = Regex::new("对不起").unwrap();
        let h2 = doc.element_with_text(&re).unwrap();
        assert_eq!(h2.name(), "h2");
        let table = h2.closest(|e| e.is("table")).unwrap();
        assert!(table.text().contains("Power User"));
    }

    #[test]
    fn deep_unclosed_nesting_is_bounded() {
        let html = format!("<div id=\"info_block\">{}x</div><p>tail", "<span>".repeat(50_000));
        let doc = Document::parse(&html);
        let info = doc.by_id("info_block").unwrap();
        assert_eq!(info.text(), "x");
        assert_eq!(doc.text(), "x tail");

        let last_span = doc.find_all(|e| e.is("span")).pop().unwrap();
        let mut deepest = 0;
        let mut cur = last_span.parent();
        while let Some(p) = cur {
            deepest += 1;
            cur = p.parent();
        }
        assert!(deepest <= MAX_DEPTH);
    }

    #[test]
    fn block_text_is_separated() {
        let doc = Document::parse("<table><tr><td>a</td><td>b<span>c</span></td></tr></table>d");
        assert_eq!(doc.text(), "a bc d");
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a&amp;b &#21704; &#x54C8; &bogus;"), "a&b 哈 哈 &bogus;");
        assert_eq!(collapse_whitespace("  a \n\t b\u{a0}c "), "a b c");
    }
}
