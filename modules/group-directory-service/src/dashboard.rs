//! Directory HTML page handler.
//!
//! Serves a self-contained HTML page with inline CSS/JS: a submission
//! form, a search box and the current list of groups.

use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use group_directory_types::GroupQuery;
use std::sync::Arc;

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GroupQuery>,
) -> impl IntoResponse {
    let term = query.q.unwrap_or_default();
    let groups = state.store.search(Some(term.as_str()));
    let total = state.store.count();
    let last_backup = state.last_backup_at.lock().await.clone();
    let uptime = state.start_time.elapsed().as_secs();

    let mut cards = String::new();
    for g in &groups {
        cards.push_str(&format!(
            r#"<div class="card">
        <img src="{image}" alt="" loading="lazy">
        <div class="body">
          <div class="name">{name}</div>
          <div class="owner">by {owner}</div>
          <a class="join" href="{link}" target="_blank" rel="noopener">Join group</a>
        </div>
      </div>
"#,
            image = escape_html(&g.image_path),
            name = escape_html(&g.group_name),
            owner = escape_html(&g.username),
            link = escape_html(&g.group_link),
        ));
    }
    if cards.is_empty() {
        cards = if term.trim().is_empty() {
            "<p class=\"empty\">No groups yet. Be the first to add one.</p>".to_string()
        } else {
            "<p class=\"empty\">No groups match your search.</p>".to_string()
        };
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Group Directory</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f1117; color: #e0e0e0; padding: 20px; }}
  h1 {{ color: #25d366; margin-bottom: 8px; }}
  h2 {{ color: #c9d1d9; margin-bottom: 12px; font-size: 1.1em; }}
  .meta {{ color: #8b949e; font-size: 0.85em; margin-bottom: 20px; }}
  .section {{ margin-bottom: 28px; }}
  form {{ display: flex; gap: 8px; flex-wrap: wrap; }}
  input {{ background: #161b22; color: #e0e0e0; border: 1px solid #30363d; border-radius: 6px; padding: 8px 10px; }}
  button {{ background: #238636; color: #fff; border: 0; border-radius: 6px; padding: 8px 14px; cursor: pointer; }}
  #status {{ margin-top: 8px; font-size: 0.85em; color: #8b949e; }}
  .grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 16px; }}
  .card {{ background: #161b22; border: 1px solid #30363d; border-radius: 8px; overflow: hidden; }}
  .card img {{ width: 100%; height: 140px; object-fit: cover; background: #21262d; }}
  .card .body {{ padding: 12px; }}
  .card .name {{ font-weight: bold; margin-bottom: 4px; }}
  .card .owner {{ color: #8b949e; font-size: 0.85em; margin-bottom: 8px; }}
  .empty {{ color: #8b949e; }}
  a {{ color: #58a6ff; text-decoration: none; }}
  a:hover {{ text-decoration: underline; }}
</style>
</head>
<body>
  <h1>Group Directory</h1>
  <p class="meta">{total} groups &middot; Uptime: {uptime_str} &middot; Last backup: {last_backup_str}</p>

  <div class="section">
    <h2>Add a group</h2>
    <form id="add-group" enctype="multipart/form-data">
      <input name="username" placeholder="Your name" required>
      <input name="groupName" placeholder="Group name" required>
      <input name="groupLink" placeholder="https://chat.whatsapp.com/..." required>
      <input name="image" type="file" accept="image/*">
      <button type="submit">Submit</button>
    </form>
    <div id="status"></div>
  </div>

  <div class="section">
    <h2>Groups</h2>
    <form method="get" action="/">
      <input name="q" value="{term}" placeholder="Search by name or group">
      <button type="submit">Search</button>
    </form>
  </div>

  <div class="grid">
      {cards}
  </div>

  <script>
    document.getElementById('add-group').addEventListener('submit', async (ev) => {{
      ev.preventDefault();
      const status = document.getElementById('status');
      const res = await fetch('/api/groups', {{ method: 'POST', body: new FormData(ev.target) }});
      const body = await res.json().catch(() => ({{}}));
      if (res.ok) {{
        location.reload();
      }} else {{
        status.textContent = body.error || 'Failed to save group';
      }}
    }});
  </script>
</body>
</html>"#,
        total = total,
        uptime_str = format_uptime(uptime),
        last_backup_str = escape_html(last_backup.as_deref().unwrap_or("never")),
        term = escape_html(&term),
        cards = cards,
    );

    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
