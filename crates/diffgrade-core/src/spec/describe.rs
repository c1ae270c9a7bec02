//! Generated description text.

use std::collections::HashSet;

use crate::spec::Arg;
use crate::value::{identity, ObjectRef, Value};

/// Argument lists at least this long start on their own line.
const INLINE_LIMIT: usize = 45;
const WRAP_AFTER: usize = 55;
const MAX_ARG_TEXT: usize = 600;
const MAX_CHAIN: usize = 10;
const NODE_VALUE_FIELDS: &[&str] = &["item", "value", "val"];

/// `with arguments: (..)` or `without arguments`.
pub fn arg_list(args: &[Arg]) -> String {
    if args.is_empty() {
        return "without arguments".to_string();
    }
    let joined = arg_string(args);
    if joined.chars().count() < INLINE_LIMIT {
        format!("with arguments: ({})", joined)
    } else {
        format!("with arguments:\n  ({})", joined)
    }
}

/// Same as [`arg_list`] for plain strings, as passed to `main`.
pub fn string_arg_list(args: &[String]) -> String {
    let args: Vec<Arg> = args.iter().map(|s| Arg::from(s.as_str())).collect();
    arg_list(&args)
}

/// Comma-separated argument texts, wrapping after long lines.
pub fn arg_string(args: &[Arg]) -> String {
    let mut out = String::new();
    for arg in args {
        let mut piece = match arg {
            Arg::Value(v) => v.quoted(),
            Arg::Object(obj) => object_arg_text(obj.instances().expected.as_object(), obj.class_name()),
        };
        let last_line = piece.rsplit('\n').next().map_or(0, |l| l.chars().count());
        piece.push_str(if last_line > WRAP_AFTER { ",\n  " } else { ", " });
        if piece.chars().count() > MAX_ARG_TEXT {
            out.push_str("Argument omitted due to length, ");
        } else {
            out.push_str(&piece);
        }
    }
    let trimmed = out.trim_end_matches([',', ' ', '\n']);
    trimmed.to_string()
}

fn object_arg_text(obj: Option<&ObjectRef>, class_name: &str) -> String {
    let Some(obj) = obj else {
        return format!("{}(null)", class_name);
    };
    if is_node(obj) {
        return node_chain(obj);
    }
    match obj.custom_text() {
        Some(text) if text.contains('\n') => format!("{}(\n{}\n)", obj.class_name(), text),
        Some(text) => format!("{}({})", obj.class_name(), text),
        None => Value::Object(obj.clone()).text(),
    }
}

/// A linked node: its class name mentions `Node` and it declares `next`.
pub fn is_node(obj: &ObjectRef) -> bool {
    obj.class_name().contains("Node") && obj.field("next").is_some()
}

fn next_of(obj: &ObjectRef) -> Option<ObjectRef> {
    match obj.field("next") {
        Some(Value::Object(next)) => Some(next),
        _ => None,
    }
}

/// Name of the field holding a node's payload.
pub fn node_value_field(obj: &ObjectRef) -> Option<&'static str> {
    NODE_VALUE_FIELDS
        .iter()
        .copied()
        .find(|f| obj.field(f).is_some_and(|v| !v.is_null()))
}

/// `Node{1⮕ 2⮕ 3}` for short chains, `Node list of N values` otherwise.
pub fn node_chain(head: &ObjectRef) -> String {
    let mut nodes = vec![head.clone()];
    let mut seen = HashSet::from([identity(head)]);
    while let Some(next) = nodes.last().and_then(next_of) {
        if !seen.insert(identity(&next)) {
            break;
        }
        nodes.push(next);
    }
    let links = nodes.len() - 1;
    match node_value_field(head) {
        Some(field) if links <= MAX_CHAIN => {
            let items: Vec<String> = nodes
                .iter()
                .map(|n| n.field(field).unwrap_or(Value::Null).text())
                .collect();
            format!("Node{{{}}}", items.join("\u{2b95} "))
        }
        _ => format!("Node list of {} values", links),
    }
}
