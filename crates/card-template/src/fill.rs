//! Placeholder substitution: one template, one data row, one filled copy.

use crate::document::{DocObject, ObjectKind, TemplateDocument};
use crate::types::DataRow;

/// Produce a copy of `document` with every `{{field}}` token resolved
/// from `row`.
///
/// The input document is never mutated; the same template is reused for
/// every row of a batch. Text tokens with no row value become empty
/// strings. Image sources keep the literal token when the row has no
/// value, so the original reference survives instead of breaking.
pub fn fill(document: &TemplateDocument, row: &DataRow) -> TemplateDocument {
    let mut filled = document.clone();
    for object in &mut filled.objects {
        fill_object(object, row);
    }
    filled
}

fn fill_object(object: &mut DocObject, row: &DataRow) {
    match &mut object.kind {
        ObjectKind::Text { content, .. } => {
            *content = substitute_text(content, row);
        }
        ObjectKind::Image { src, .. } => {
            *src = substitute_image_src(src, row);
        }
        ObjectKind::Shape { .. } => {}
        ObjectKind::Group { children } => {
            for child in children {
                fill_object(child, row);
            }
        }
    }
}

/// Replace every `{{name}}` occurrence, repeats included. Missing or
/// empty fields substitute to the empty string.
fn substitute_text(template: &str, row: &DataRow) -> String {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find("}}") {
            let name = after[..end].trim();
            if let Some(val) = row.get(name) {
                out.push_str(val);
            }
            rest = &after[end + 2..];
        } else {
            // Unterminated token: keep the tail verbatim.
            out.push_str(rest);
            return out;
        }
    }
    out.push_str(rest);
    out
}

/// Replace `{{name}}` tokens in an image source only when the row carries
/// a non-empty value. An unresolved token is kept verbatim.
fn substitute_image_src(src: &str, row: &DataRow) -> String {
    let mut out = String::new();
    let mut rest = src;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find("}}") {
            let name = after[..end].trim();
            match row.get(name) {
                Some(val) if !val.is_empty() => out.push_str(val),
                _ => out.push_str(&format!("{{{{{name}}}}}")),
            }
            rest = &after[end + 2..];
        } else {
            out.push_str(rest);
            return out;
        }
    }
    out.push_str(rest);
    out
}
