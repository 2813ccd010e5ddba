//! The single HTML page served at `/` and returned after an upload.

use crate::models::ExtractedDocument;

const STYLE: &str = r#"
body {
  font-family: system-ui, sans-serif; max-width: 760px;
  margin: 2rem auto; padding: 0 1rem; color: #222;
}
h1 { font-size: 1.6rem; }
section {
  border: 1px solid #ddd; border-radius: 8px;
  padding: 1rem 1.25rem; margin-bottom: 1.5rem;
}
.result dt { font-weight: 600; margin-top: .5rem; }
.result dd { margin-left: 0; }
#chat-log {
  min-height: 6rem; max-height: 24rem; overflow-y: auto; white-space: pre-wrap;
  background: #fafafa; padding: .5rem; border-radius: 4px;
}
#chat-log .user { color: #0b5394; }
#chat-log .error { color: #b00020; }
form.inline { display: flex; gap: .5rem; }
form.inline input[type=text] { flex: 1; }
"#;

const CHAT_SCRIPT: &str = r#"
const form = document.getElementById('chat-form');
const input = document.getElementById('chat-input');
const log = document.getElementById('chat-log');
function append(cls, text) {
  const p = document.createElement('p');
  p.className = cls;
  p.textContent = text;
  log.appendChild(p);
  log.scrollTop = log.scrollHeight;
}
form.addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const message = input.value.trim();
  if (!message) return;
  append('user', 'You: ' + message);
  input.value = '';
  try {
    const res = await fetch('/api/cooking/chat', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ message }),
    });
    const data = await res.json();
    if (res.ok) {
      append('assistant', 'Chef: ' + data.response);
    } else {
      append('error', data.error || ('HTTP ' + res.status));
    }
  } catch (err) {
    append('error', String(err));
  }
});
"#;

/// Render the page, optionally with the result of the last upload.
pub fn render_index(result: Option<&ExtractedDocument>) -> String {
    let result_section = result.map(render_result).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>PDF Summarizer &amp; Cooking Assistant</title>
<style>{style}</style>
</head>
<body>
<h1>PDF Summarizer &amp; Cooking Assistant</h1>
<section>
<h2>Summarize a PDF</h2>
<form action="/upload" method="post" enctype="multipart/form-data" class="inline">
<input type="file" name="file" accept="application/pdf" required>
<button type="submit">Upload</button>
</form>
</section>
{result_section}<section>
<h2>Ask the chef</h2>
<div id="chat-log"></div>
<form id="chat-form" class="inline">
<input type="text" id="chat-input" autocomplete="off"
  placeholder="What can I cook with tomatoes and garlic?">
<button type="submit">Send</button>
</form>
</section>
<script>{script}</script>
</body>
</html>
"#,
        style = STYLE,
        result_section = result_section,
        script = CHAT_SCRIPT,
    )
}

fn render_result(doc: &ExtractedDocument) -> String {
    format!(
        r#"<section class="result">
<h2>Summary</h2>
<dl>
<dt>File</dt><dd>{}</dd>
<dt>Title</dt><dd>{}</dd>
<dt>Author</dt><dd>{}</dd>
<dt>Summary</dt><dd>{}</dd>
</dl>
</section>
"#,
        escape_html(&doc.filename),
        escape_html(&doc.title),
        escape_html(&doc.author),
        escape_html(&doc.summary),
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_has_upload_form_and_chat() {
        let html = render_index(None);
        assert!(html.contains(r#"action="/upload""#));
        assert!(html.contains(r#"name="file""#));
        assert!(html.contains("/api/cooking/chat"));
        assert!(!html.contains(r#"class="result""#));
    }

    #[test]
    fn result_fields_are_escaped() {
        let doc = ExtractedDocument {
            title: "<script>alert(1)</script>".into(),
            author: "O'Brien & Sons".into(),
            summary: "Short.".into(),
            filename: "a\"b.pdf".into(),
        };
        let html = render_index(Some(&doc));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("O&#x27;Brien &amp; Sons"));
        assert!(html.contains("a&quot;b.pdf"));
        assert!(!html.contains("<script>alert(1)"));
    }
}
