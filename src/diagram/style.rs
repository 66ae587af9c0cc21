//! Node styling for generated DOT.
//!
//! Node-definition lines get a fill colour and font picked by their position,
//! so the same source always renders the same way. Attributes already set in
//! the source are left alone.

use regex::Regex;
use std::sync::LazyLock;

pub const PALETTE: [&str; 6] = [
    "#AED6F1", "#A9DFBF", "#F9E79F", "#F5CBA7", "#D7BDE2", "#FADBD8",
];
pub const FONTS: [&str; 3] = ["Helvetica", "Arial", "Verdana"];

const DEFAULT_NODE_LINE: &str =
    "    node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\"];";

static NODE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)("[^"]+"|[A-Za-z_][A-Za-z0-9_]*)\s*\[(.*)\]\s*;?\s*$"#)
        .expect("valid regex")
});

static NODE_DEFAULTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*node\s*\[").expect("valid regex"));

const RESERVED_IDS: [&str; 4] = ["graph", "node", "edge", "subgraph"];

fn has_attr(attrs: &str, name: &str) -> bool {
    attrs
        .split([',', ';'])
        .filter_map(|pair| pair.split('=').next())
        .any(|key| key.trim().eq_ignore_ascii_case(name))
}

fn styled_node_line(indent: &str, id: &str, attrs: &str, index: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let attrs = attrs.trim().trim_end_matches(',');
    if !attrs.is_empty() {
        parts.push(attrs.to_string());
    }
    if !has_attr(attrs, "style") {
        parts.push("style=\"filled,rounded\"".to_string());
    }
    if !has_attr(attrs, "fillcolor") {
        parts.push(format!("fillcolor=\"{}\"", PALETTE[index % PALETTE.len()]));
    }
    if !has_attr(attrs, "fontname") {
        parts.push(format!("fontname=\"{}\"", FONTS[index % FONTS.len()]));
    }
    format!("{}{} [{}];", indent, id, parts.join(", "))
}

/// Applies node styling to `dot`.
pub fn style_dot(dot: &str) -> String {
    let has_defaults = dot.lines().any(|line| NODE_DEFAULTS.is_match(line));
    let mut defaults_pending = !has_defaults;
    let mut node_index = 0;
    let mut out: Vec<String> = Vec::new();

    for line in dot.lines() {
        let styled = NODE_LINE.captures(line).and_then(|caps| {
            let indent = caps.get(1).map_or("", |m| m.as_str());
            let id = caps.get(2)?.as_str();
            let attrs = caps.get(3).map_or("", |m| m.as_str());
            if RESERVED_IDS.iter().any(|r| id.eq_ignore_ascii_case(r)) {
                return None;
            }
            Some(styled_node_line(indent, id, attrs, node_index))
        });

        match styled {
            Some(styled) => {
                node_index += 1;
                out.push(styled);
            }
            None => out.push(line.to_string()),
        }

        if defaults_pending && line.contains('{') {
            out.push(DEFAULT_NODE_LINE.to_string());
            defaults_pending = false;
        }
    }

    out.join("\n")
}
