//! Free-tier tools: a three-file static site and a web server to serve it.

pub mod files;
pub mod server;

pub use files::{ReadCurrentFilesTool, UpdateFilesTool};
pub use server::StartWebServerTool;

pub const TOOL_READ_CURRENT_FILES: &str = "readCurrentFiles";
pub const TOOL_UPDATE_FILES: &str = "updateFiles";
pub const TOOL_START_WEB_SERVER: &str = "startWebServer";

pub const HTML_PATH: &str = "index.html";
pub const CSS_PATH: &str = "style.css";
pub const JS_PATH: &str = "script.js";

/// Port the free-tier site is served on.
pub const SITE_PORT: u16 = 8000;

/// Starter project written into the sandbox before the first free-tier turn.
pub const BASE_SCAFFOLD: [(&str, &str); 3] = [
    (HTML_PATH, BASE_HTML),
    (CSS_PATH, BASE_CSS),
    (JS_PATH, BASE_JS),
];

const BASE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>My App</title>
  <link rel="stylesheet" href="style.css" />
</head>
<body>
  <main class="container">
    <h1 id="title">Hello, world!</h1>
    <p id="message">Edit index.html, style.css and script.js to build your app.</p>
    <button id="action-button" type="button">Click me</button>
  </main>
  <script src="script.js"></script>
</body>
</html>
"#;

const BASE_CSS: &str = r#"* {
  box-sizing: border-box;
}

body {
  margin: 0;
  min-height: 100vh;
  display: flex;
  align-items: center;
  justify-content: center;
  font-family: system-ui, -apple-system, "Segoe UI", Roboto, sans-serif;
  background: #f5f5f7;
  color: #1d1d1f;
}

.container {
  text-align: center;
  padding: 2rem;
}

button {
  padding: 0.6rem 1.4rem;
  border: none;
  border-radius: 0.5rem;
  background: #0071e3;
  color: #fff;
  font-size: 1rem;
  cursor: pointer;
}

button:hover {
  background: #0077ed;
}
"#;

const BASE_JS: &str = r#"document.addEventListener("DOMContentLoaded", () => {
  const button = document.getElementById("action-button");
  const message = document.getElementById("message");

  button.addEventListener("click", () => {
    message.textContent = "Button clicked!";
  });
});
"#;
