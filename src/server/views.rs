use crate::models::GenerationOutcome;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

pub const TITLE: &str = "🎨 Text-to-Image Generator";
pub const PROMPT_PLACEHOLDER: &str = "Enter your prompt (e.g. 'a cute cat on a bike')";
pub const BUTTON_LABEL: &str = "Generate Image";
pub const BUSY_LABEL: &str = "Generating...";
pub const CAPTION: &str = "Generated via Stable Diffusion";
pub const LINK_LABEL: &str = "🔗 Click to view full image";
pub const UPLOAD_FAILED: &str = "❌ Failed to upload image.";

const STYLE: &str = r#"
body {
  font-family: system-ui, sans-serif; max-width: 46rem; margin: 2rem auto;
  padding: 0 1rem; color: #262730;
}
form { display: flex; flex-direction: column; gap: .75rem; }
input[type=text] {
  padding: .6rem; font-size: 1rem; border: 1px solid #ccc; border-radius: .4rem;
}
button {
  align-self: flex-start; padding: .5rem 1rem; border-radius: .4rem;
  border: 1px solid #ccc; background: #fff; cursor: pointer;
}
#busy { margin-top: 1rem; }
.spinner {
  display: inline-block; width: 1rem; height: 1rem; border: 2px solid #ccc;
  border-top-color: #ff4b4b; border-radius: 50%; animation: spin 1s linear infinite;
  vertical-align: middle;
}
@keyframes spin { to { transform: rotate(360deg); } }
figure { margin: 1.5rem 0 .5rem; }
figure img { max-width: 100%; }
figcaption { color: #808495; font-size: .9rem; text-align: center; }
.error {
  margin-top: 1rem; padding: 1rem; border-radius: .4rem; background: #ffebeb;
  color: #7d353b;
}
.variants { font-size: .9rem; color: #808495; }
"#;

const BUSY_SCRIPT: &str = r#"
document.getElementById('prompt-form').addEventListener('submit', function (event) {
  var prompt = document.getElementById('prompt');
  if (!prompt.value.trim()) { event.preventDefault(); return; }
  document.getElementById('generate').disabled = true;
  document.getElementById('busy').hidden = false;
  var result = document.getElementById('result');
  if (result) { result.hidden = true; }
});
"#;

/// Landing page, also shown when an empty prompt is submitted.
pub fn idle_page(prompt: &str) -> String {
    page(prompt, "")
}

pub fn result_page(outcome: &GenerationOutcome) -> String {
    let body = match &outcome.upload {
        Ok(image) => format!(
            concat!(
                "<section id=\"result\">",
                "<figure><img src=\"{url}\" alt=\"{alt}\">",
                "<figcaption>{caption}</figcaption></figure>",
                "<p><a href=\"{url}\" target=\"_blank\" rel=\"noopener\">{link}</a></p>",
                "<p class=\"variants\">",
                "<a href=\"{optimized}\" target=\"_blank\" rel=\"noopener\">Optimized</a>",
                " · <a href=\"{thumbnail}\" target=\"_blank\" rel=\"noopener\">500×500 crop</a>",
                "</p>",
                "</section>"
            ),
            url = attr(&image.secure_url),
            alt = attr(&outcome.prompt),
            caption = CAPTION,
            link = LINK_LABEL,
            optimized = attr(&image.optimized_url),
            thumbnail = attr(&image.thumbnail_url),
        ),
        Err(_) => format!(
            "<section id=\"result\"><div class=\"error\" role=\"alert\">{}</div></section>",
            UPLOAD_FAILED
        ),
    };

    page(&outcome.prompt, &body)
}

/// Shown when generation itself fails.
pub fn error_page(prompt: &str, message: &str) -> String {
    let body = format!(
        concat!(
            "<section id=\"result\"><div class=\"error\" role=\"alert\">",
            "<strong>Something went wrong.</strong><br>{}</div></section>"
        ),
        text(message)
    );
    page(prompt, &body)
}

fn page(prompt: &str, result: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<h1>{title}</h1>
<form id="prompt-form" method="post" action="/generate">
<input type="text" id="prompt" name="prompt" value="{prompt}"
  placeholder="{placeholder}" autocomplete="off">
<button type="submit" id="generate">{button}</button>
</form>
<div id="busy" hidden><span class="spinner"></span> {busy}</div>
{result}
<script>{script}</script>
</body>
</html>"#,
        title = TITLE,
        style = STYLE,
        prompt = attr(prompt),
        placeholder = attr(PROMPT_PLACEHOLDER),
        button = BUTTON_LABEL,
        busy = BUSY_LABEL,
        result = result,
        script = BUSY_SCRIPT,
    )
}
