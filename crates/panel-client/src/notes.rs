//! Notes sanitisation before submission.
//!
//! The test tool's notes editor produces Qt rich-text HTML. The panel
//! stores markdown, so before a report goes out every notes field is
//! flattened: tags stripped, entities decoded, embedded screenshots kept
//! as `{{IMAGE:...}}` markers, and code blocks converted to fenced
//! markdown. Notes that already look like markdown pass through untouched
//! apart from Qt's stylesheet line.

use regex::Regex;
use serde_json::Value;

const QT_CSS_LINE: &str = "p, li { white-space: pre-wrap; }";

/// Strip HTML from one notes string, preserving images and code blocks.
pub fn clean_notes(notes: &str) -> String {
    if notes.is_empty() {
        return String::new();
    }

    let markdown_fence = Regex::new(r"```[\s\S]*?```").expect("invalid fence regex");
    let markdown_image = Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("invalid image regex");
    let image_marker =
        Regex::new(r"\[image:data:image/|\{\{IMAGE:data:image/").expect("invalid marker regex");

    // Already markdown: leave it alone apart from the Qt stylesheet.
    if markdown_fence.is_match(notes)
        || markdown_image.is_match(notes)
        || image_marker.is_match(notes)
    {
        return notes.replace(QT_CSS_LINE, "").trim().to_string();
    }

    // Pull out embedded screenshots before tags are stripped. Qt wraps the
    // full image in an anchor href with a thumbnail img inside, so anchors
    // win and duplicates are dropped.
    let anchor_image = Regex::new(r#"(?i)<a\s+[^>]*href=["']?(data:image/[^"'>\s]+)["']?[^>]*>"#)
        .expect("invalid anchor regex");
    let inline_image = Regex::new(r#"(?i)<img\s+[^>]*src=["']?(data:image/[^"'>\s]+)["']?[^>]*>"#)
        .expect("invalid img regex");
    let mut images: Vec<String> = Vec::new();
    for caps in anchor_image.captures_iter(notes) {
        let uri = caps[1].to_string();
        if !images.contains(&uri) {
            images.push(uri);
        }
    }
    for caps in inline_image.captures_iter(notes) {
        let uri = caps[1].to_string();
        if !images.contains(&uri) {
            images.push(uri);
        }
    }

    // Qt's toHtml() does not preserve <pre><code>, so the editor brackets
    // code regions with ⟦CODE⟧/⟦/CODE⟧ text markers that survive the
    // transform. Convert those first, then any explicit <pre><code>
    // blocks, all protected behind placeholders until the general tag
    // strip is done.
    let marked_code = Regex::new(r"⟦CODE⟧([\s\S]*?)⟦/CODE⟧").expect("invalid code marker regex");
    let mut code_blocks: Vec<String> = Vec::new();
    let text = marked_code
        .replace_all(notes, |caps: &regex::Captures<'_>| {
            let code = decode_entities(&strip_tags(&normalize_breaks(&caps[1])));
            let placeholder = format!("__CODE_BLOCK_{}__", code_blocks.len());
            code_blocks.push(format!("```\n{code}\n```"));
            placeholder
        })
        .into_owned();

    let pre_code = Regex::new(r"(?i)<pre([^>]*)>\s*<code[^>]*>([\s\S]*?)</code>\s*</pre>")
        .expect("invalid pre regex");
    let lang_attr = Regex::new(r#"data-language=["'](\w+)["']"#).expect("invalid lang regex");
    let text = pre_code
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let lang = lang_attr
                .captures(&caps[1])
                .map(|l| l[1].to_string())
                .unwrap_or_default();
            let code = decode_entities(&strip_tags(&normalize_breaks(&caps[2])));
            let placeholder = format!("__CODE_BLOCK_{}__", code_blocks.len());
            code_blocks.push(format!("```{lang}\n{code}\n```"));
            placeholder
        })
        .into_owned();

    let mut text = decode_entities(&strip_tags(&text));
    text = text.replace(QT_CSS_LINE, "");

    // Qt leaves a bare "image" link label behind once the anchor is gone.
    let image_label = Regex::new(r"(?i)\bimage\b\s*").expect("invalid label regex");
    text = image_label.replace_all(&text, "").trim().to_string();

    for (i, block) in code_blocks.iter().enumerate() {
        text = text.replace(&format!("__CODE_BLOCK_{i}__"), &format!("\n\n{block}\n\n"));
    }

    let squeeze = Regex::new(r"\n{3,}").expect("invalid squeeze regex");
    text = squeeze.replace_all(&text, "\n\n").trim().to_string();

    for uri in &images {
        text.push_str("\n\n{{IMAGE:");
        text.push_str(uri);
        text.push_str("}}");
    }
    text.trim().to_string()
}

/// Clean every notes field in a session payload, in place.
pub fn prepare_submission(data: &mut Value) {
    let Some(results) = data.get_mut("results").and_then(Value::as_object_mut) else {
        return;
    };
    for version_results in results.values_mut() {
        let Some(tests) = version_results.as_object_mut() else {
            continue;
        };
        for entry in tests.values_mut() {
            if let Some(notes) = entry.get("notes").and_then(Value::as_str) {
                let cleaned = clean_notes(notes);
                entry["notes"] = Value::String(cleaned);
            }
        }
    }
}

fn normalize_breaks(html: &str) -> String {
    let br = Regex::new(r"(?i)<br\s*/?>").expect("invalid br regex");
    let para = Regex::new(r"(?i)</p>\s*<p[^>]*>").expect("invalid p regex");
    let div = Regex::new(r"(?i)</div>\s*<div[^>]*>").expect("invalid div regex");
    let adjacent = Regex::new(r">\s*<").expect("invalid gap regex");
    let out = br.replace_all(html, "\n");
    let out = para.replace_all(&out, "\n");
    let out = div.replace_all(&out, "\n");
    adjacent.replace_all(&out, "> <").into_owned()
}

fn strip_tags(html: &str) -> String {
    let tag = Regex::new(r"<[^>]+>").expect("invalid tag regex");
    tag.replace_all(html, "").into_owned()
}

fn decode_entities(text: &str) -> String {
    // Qt only ever emits the named entities below plus numeric ones.
    let mut out = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");
    let numeric = Regex::new(r"&#(\d+);").expect("invalid entity regex");
    out = numeric
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .into_owned();
    // Ampersand last so freshly decoded entities are not re-decoded.
    out.replace("&amp;", "&")
}
