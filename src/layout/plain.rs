/// Graphviz plain output is in inches
pub const PX_PER_INCH: f64 = 96.0;

/// A laid-out node, centre position and size in pixels, y pointing down
#[derive(Debug, Clone, PartialEq)]
pub struct PlainNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainEdge {
    pub tail: String,
    pub head: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlainLayout {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PlainNode>,
    pub edges: Vec<PlainEdge>,
}

impl PlainLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&PlainNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Split a plain-format line into tokens, honouring double-quoted strings
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

fn num(token: Option<&String>) -> Option<f64> {
    token.and_then(|t| t.parse().ok())
}

/// Parse `dot -Tplain` output.
///
/// Coordinates are scaled to pixels and y is negated so that it grows
/// downwards. Lines that do not parse are skipped.
pub fn parse_plain(text: &str) -> PlainLayout {
    let mut layout = PlainLayout::default();

    for line in text.lines() {
        let tokens = tokenize(line);
        match tokens.first().map(String::as_str) {
            Some("graph") => {
                if let (Some(w), Some(h)) = (num(tokens.get(2)), num(tokens.get(3))) {
                    layout.width = w * PX_PER_INCH;
                    layout.height = h * PX_PER_INCH;
                }
            }
            Some("node") => {
                let parsed = (
                    tokens.get(1),
                    num(tokens.get(2)),
                    num(tokens.get(3)),
                    num(tokens.get(4)),
                    num(tokens.get(5)),
                );
                if let (Some(id), Some(x), Some(y), Some(w), Some(h)) = parsed {
                    layout.nodes.push(PlainNode {
                        id: id.clone(),
                        x: x * PX_PER_INCH,
                        y: -y * PX_PER_INCH,
                        width: w * PX_PER_INCH,
                        height: h * PX_PER_INCH,
                    });
                }
            }
            Some("edge") => {
                if let (Some(tail), Some(head)) = (tokens.get(1), tokens.get(2)) {
                    layout.edges.push(PlainEdge {
                        tail: tail.clone(),
                        head: head.clone(),
                    });
                }
            }
            Some("stop") => break,
            _ => {}
        }
    }

    layout
}
