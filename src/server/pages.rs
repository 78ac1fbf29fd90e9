//! Embedded kiosk pages.
//!
//! The kiosk serves two small self-contained pages; there is no template
//! engine and no static asset directory to deploy.

pub(super) const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Tag Kiosk</title>
<style>
body { font-family: sans-serif; max-width: 40em; margin: 2em auto; }
label { display: block; margin-top: 0.8em; }
input { width: 100%; }
button { margin-top: 1.2em; padding: 0.5em 2em; }
#result { margin-top: 1em; color: #060; }
</style>
</head>
<body>
<h1>Badge Configurator</h1>
<form id="badge-form">
  <label>Nickname <input name="nickname" maxlength="32"></label>
  <label>Habitat <input name="habitat" maxlength="32"></label>
  <label>Space <input name="space" maxlength="32"></label>
  <label>Languages <input name="languages" maxlength="32"></label>
  <label>DECT <input name="dect" maxlength="16"></label>
  <label>Pronouns <input name="pronouns" maxlength="16"></label>
  <label>MAC address <input name="mac_address" maxlength="17" required></label>
  <button type="submit">Generate &amp; upload</button>
</form>
<p id="result"></p>
<p><a href="/barcode.html">Barcode scanner view</a></p>
<script>
document.getElementById('badge-form').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const fields = Object.fromEntries(new FormData(ev.target).entries());
  const response = await fetch('/upload', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify(fields),
  });
  const reply = await response.json();
  document.getElementById('result').textContent = reply.message;
});
</script>
</body>
</html>
"#;

pub(super) const BARCODE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Barcode Scanner</title>
<style>
body { font-family: sans-serif; text-align: center; margin-top: 2em; }
img { max-width: 90vw; border: 1px solid #444; }
</style>
</head>
<body>
<h1>Barcode Scanner</h1>
<img src="/video_feed" alt="live camera stream">
<p><a href="/">Back to the configurator</a></p>
</body>
</html>
"#;
