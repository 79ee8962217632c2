//! Server-rendered HTML pages.

use std::fmt::Write;

use super::Notice;

const STYLE: &str = r"
body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }
nav a { margin-right: 1rem; }
form { display: grid; gap: 0.5rem; margin-top: 1rem; }
.notice { padding: 0.5rem 1rem; border-radius: 4px; background: #fff4ce; }
.notice.ok { background: #dff6dd; }
.notice.err { background: #fde7e9; }
#result { margin-top: 1rem; font-weight: bold; }
";

/// Escape text for use in HTML content and attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, notice: Option<Notice>, body: &str) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <nav><a href=\"/\">Home</a><a href=\"/add_user\">Add student</a>\
         <a href=\"/scan\">Scan</a><a href=\"/download_csv\">Download CSV</a>\
         <a href=\"/delete_all\">Delete all</a></nav>\n<h1>{title}</h1>\n",
        title = escape(title),
    );
    if let Some(notice) = notice {
        let _ = writeln!(
            html,
            "<p class=\"notice {}\">{}</p>",
            notice.class(),
            escape(notice.message())
        );
    }
    html.push_str(body);
    html.push_str("\n</body>\n</html>\n");
    html
}

/// Landing page.
#[must_use]
pub fn landing(notice: Option<Notice>) -> String {
    layout(
        "QR Attendance",
        notice,
        "<p>Register students to generate their QR codes, then scan codes to mark attendance.</p>\n\
         <ul>\n<li><a href=\"/add_user\">Add a student</a></li>\n\
         <li><a href=\"/scan\">Open the scanner</a></li>\n\
         <li><a href=\"/download_csv\">Download attendance</a></li>\n</ul>",
    )
}

/// Registration form, optionally showing a generated image.
#[must_use]
pub fn add_user(notice: Option<Notice>, qr_image: Option<&str>) -> String {
    let mut body = String::from(
        "<form method=\"post\" action=\"/add_user\">\n\
         <input type=\"password\" name=\"password\" placeholder=\"Admin password\" required>\n\
         <input name=\"name\" placeholder=\"Name\" required>\n\
         <input name=\"roll\" placeholder=\"Roll number\" required>\n\
         <input name=\"dept\" placeholder=\"Department\" required>\n\
         <input name=\"year\" placeholder=\"Year\" required>\n\
         <input name=\"section\" placeholder=\"Section\" required>\n\
         <button type=\"submit\">Generate QR</button>\n</form>\n",
    );
    if let Some(image) = qr_image {
        let image = escape(image);
        let _ = write!(
            body,
            "<figure>\n<img src=\"/static/qrcodes/{image}\" alt=\"QR code {image}\">\n\
             <figcaption><a href=\"/static/qrcodes/{image}\" download>{image}</a></figcaption>\n\
             </figure>"
        );
    }
    layout("Add Student", notice, &body)
}

/// Reset form.
#[must_use]
pub fn delete_all(notice: Option<Notice>) -> String {
    layout(
        "Delete All Data",
        notice,
        "<p>This removes every student, attendance record and QR code. It cannot be undone.</p>\n\
         <form method=\"post\" action=\"/delete_all\">\n\
         <input type=\"password\" name=\"password\" placeholder=\"Admin password\" required>\n\
         <input name=\"confirm_text\" placeholder=\"Type DELETE to confirm\" required>\n\
         <button type=\"submit\">Delete everything</button>\n</form>",
    )
}

/// Scanner page. Decoded codes are posted to `/mark_attendance`.
#[must_use]
pub fn scan() -> String {
    layout(
        "Scan QR",
        None,
        r#"<div id="reader" style="width: 100%"></div>
<form id="manual">
<input id="qr_data" placeholder="Or type an identifier">
<button type="submit">Mark</button>
</form>
<p id="result"></p>
<script src="https://unpkg.com/html5-qrcode@2.3.8/html5-qrcode.min.js"></script>
<script>
let busy = false;
async function mark(qrData) {
  if (busy) return;
  busy = true;
  try {
    const res = await fetch("/mark_attendance", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ qr_data: qrData }),
    });
    const data = await res.json();
    const el = document.getElementById("result");
    el.textContent = data.message;
    el.className = data.status;
  } finally {
    setTimeout(() => { busy = false; }, 1500);
  }
}
document.getElementById("manual").addEventListener("submit", (e) => {
  e.preventDefault();
  mark(document.getElementById("qr_data").value);
});
if (window.Html5QrcodeScanner) {
  new Html5QrcodeScanner("reader", { fps: 10, qrbox: 250 }).render(mark);
}
</script>"#,
    )
}
