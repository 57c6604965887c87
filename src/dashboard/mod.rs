use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::models::RunSummary;
use crate::db::Database;
use crate::metrics::EventCategory;
use crate::pipeline::ResultsSummary;

const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Window of the run being served, shown in the page header.
    pub window_secs: f64,
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/results", get(results_handler))
        .route("/api/runs", get(runs_handler))
        .route("/api/players", get(players_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub category: Option<String>,
}

/// Clamp paging and check the category name against the taxonomy.
fn resolve_query(q: &ResultsQuery) -> Result<(i64, i64, Option<String>), (StatusCode, String)> {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = q.offset.unwrap_or(0).max(0);
    let category = match q.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => {
            let category: EventCategory = name
                .parse()
                .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;
            Some(category.as_str().to_string())
        }
    };
    Ok((limit, offset, category))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Serve the dashboard HTML page, injecting the analysis window.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = DASHBOARD_HTML.replace(
        r#"<body>"#,
        &format!(r#"<body data-window="{}">"#, state.window_secs),
    );
    Html(html)
}

/// GET /api/summary
async fn summary_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let run = state.db.latest_run().map_err(internal)?;
    let summary = match run.as_ref().and_then(|r| r.id) {
        Some(id) => state.db.run_summary(id).map_err(internal)?,
        None => ResultsSummary::default(),
    };
    Ok(Json(RunSummary { run, summary }))
}

/// GET /api/results?limit=100&offset=0&category=goal_scored
async fn results_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ResultsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (limit, offset, category) = resolve_query(&q)?;
    let Some(run_id) = state.db.latest_run().map_err(internal)?.and_then(|r| r.id) else {
        return Ok(Json(Vec::new()));
    };
    state
        .db
        .list_results(run_id, limit, offset, category.as_deref())
        .map(Json)
        .map_err(internal)
}

/// GET /api/runs
async fn runs_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.db.list_runs(50).map(Json).map_err(internal)
}

/// GET /api/players
async fn players_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(run_id) = state.db.latest_run().map_err(internal)?.and_then(|r| r.id) else {
        return Ok(Json(Vec::new()));
    };
    state.db.player_aggregates(run_id).map(Json).map_err(internal)
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>R3ACT Dashboard</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  .badge { padding: .2rem .6rem; border-radius: 4px; font-size: .75rem; font-weight: 700; text-transform: uppercase; background: var(--accent); color: #fff; }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }
  .stats-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 1rem; }
  .stat-card { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 1.2rem; }
  .stat-card .label { color: var(--muted); font-size: .8rem; text-transform: uppercase; letter-spacing: .06em; margin-bottom: .4rem; }
  .stat-card .value { font-size: 1.7rem; font-weight: 700; }
  .stat-card .sub { color: var(--muted); font-size: .75rem; margin-top: .3rem; }
  .pos { color: var(--green); }
  .neg { color: var(--red); }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; display: flex; justify-content: space-between; align-items: center; gap: 1rem; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  tr:last-child td { border-bottom: none; }
  .pill { display: inline-block; padding: .15rem .55rem; border-radius: 20px; font-size: .75rem; font-weight: 600; background: rgba(108,99,255,.2); color: var(--accent); }
  .pill.goal { background: rgba(0,200,150,.15); color: var(--green); }
  .two-col { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; }
  @media (max-width: 768px) { .two-col { grid-template-columns: 1fr; } }
  .empty { color: var(--muted); text-align: center; padding: 2rem; font-size: .9rem; }
  select, .refresh-btn { background: none; border: 1px solid var(--border); color: var(--muted); padding: .3rem .8rem; border-radius: 6px; cursor: pointer; font-size: .8rem; }
  .refresh-btn:hover { border-color: var(--accent); color: var(--accent); }
</style>
</head>
<body>
<header>
  <h1>R3ACT</h1>
  <span class="badge" id="window-badge">…</span>
  <span style="margin-left:auto;color:var(--muted);font-size:.8rem;" id="last-updated"></span>
</header>

<main>
  <div class="stats-grid">
    <div class="stat-card"><div class="label">Critical Events</div><div class="value" id="s-events">–</div><div class="sub" id="s-matches"></div></div>
    <div class="stat-card"><div class="label">CRT (mean)</div><div class="value" id="s-crt">–</div><div class="sub" id="s-crt-sub"></div></div>
    <div class="stat-card"><div class="label">TSI (mean)</div><div class="value" id="s-tsi">–</div><div class="sub" id="s-tsi-sub"></div></div>
    <div class="stat-card"><div class="label">GIRI (mean)</div><div class="value" id="s-giri">–</div><div class="sub" id="s-giri-sub"></div></div>
  </div>

  <div class="two-col">
    <div class="panel">
      <div class="panel-header">Events by Category</div>
      <table>
        <thead><tr><th>Category</th><th>Events</th></tr></thead>
        <tbody id="categories-tbody"><tr><td colspan="2" class="empty">Loading…</td></tr></tbody>
      </table>
    </div>

    <div class="panel">
      <div class="panel-header">Players</div>
      <table>
        <thead><tr><th>Player</th><th>Team</th><th>Events</th><th>CRT</th><th>TSI</th></tr></thead>
        <tbody id="players-tbody"><tr><td colspan="5" class="empty">Loading…</td></tr></tbody>
      </table>
    </div>
  </div>

  <div class="panel">
    <div class="panel-header">
      Results
      <span>
        <select id="category-filter" onchange="loadResults()"><option value="">All categories</option></select>
        <button class="refresh-btn" onclick="loadAll()">↻ Refresh</button>
      </span>
    </div>
    <table>
      <thead><tr><th>Match</th><th>Time</th><th>Player</th><th>Category</th><th>Weight</th><th>CRT</th><th>TSI</th><th>GIRI</th></tr></thead>
      <tbody id="results-tbody"><tr><td colspan="8" class="empty">Loading…</td></tr></tbody>
    </table>
  </div>

  <div class="panel">
    <div class="panel-header">Runs</div>
    <table>
      <thead><tr><th>Finished</th><th>Source</th><th>Window</th><th>Matches</th><th>Failed</th><th>Events</th><th>Baselines</th></tr></thead>
      <tbody id="runs-tbody"><tr><td colspan="7" class="empty">Loading…</td></tr></tbody>
    </table>
  </div>
</main>

<script>
const num = (v, d = 2) => Number.isFinite(v) ? v.toFixed(d) : '–';
const signed = v => Number.isFinite(v) ? '<span class="' + (v >= 0 ? 'pos' : 'neg') + '">' + (v >= 0 ? '+' : '') + v.toFixed(3) + '</span>' : '–';
const clock = s => Math.floor(s / 60) + ':' + String(Math.floor(s % 60)).padStart(2, '0');
const esc = s => String(s ?? '').replace(/[&<>"]/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;'}[c]));

function statCard(id, stats, digits) {
  document.getElementById(id).textContent = stats ? num(stats.mean, digits) : '–';
  document.getElementById(id + '-sub').textContent = stats
    ? 'n=' + stats.count + ' · median ' + num(stats.median, digits) + ' · sd ' + num(stats.std, digits)
    : 'no values';
}

async function loadSummary() {
  const r = await fetch('/api/summary');
  if (!r.ok) return;
  const { run, summary } = await r.json();
  document.getElementById('s-events').textContent = summary.total_events;
  document.getElementById('s-matches').textContent = run ? run.matches + ' match(es)' : 'no runs yet';
  statCard('s-crt', summary.crt, 1);
  statCard('s-tsi', summary.tsi, 3);
  statCard('s-giri', summary.giri, 3);

  const entries = Object.entries(summary.events_by_category);
  const tbody = document.getElementById('categories-tbody');
  tbody.innerHTML = entries.length
    ? entries.sort((a, b) => b[1] - a[1]).map(([c, n]) => '<tr><td><span class="pill' + (c.startsWith('goal') ? ' goal' : '') + '">' + esc(c) + '</span></td><td>' + n + '</td></tr>').join('')
    : '<tr><td colspan="2" class="empty">No events</td></tr>';

  const filter = document.getElementById('category-filter');
  const current = filter.value;
  filter.innerHTML = '<option value="">All categories</option>' + entries.map(([c]) => '<option value="' + esc(c) + '">' + esc(c) + '</option>').join('');
  filter.value = current;
}

async function loadResults() {
  const category = document.getElementById('category-filter').value;
  const r = await fetch('/api/results?limit=200' + (category ? '&category=' + encodeURIComponent(category) : ''));
  if (!r.ok) return;
  const results = await r.json();
  const tbody = document.getElementById('results-tbody');
  tbody.innerHTML = results.length
    ? results.map(x => '<tr><td>' + esc(x.match_name) + '</td><td>P' + (x.period ?? '?') + ' ' + clock(x.timestamp) + '</td><td>' + esc(x.player_name ?? '–') + '</td><td><span class="pill' + (x.category.startsWith('goal') ? ' goal' : '') + '">' + esc(x.category) + '</span></td><td>' + num(x.weight, 3) + '</td><td>' + (x.crt == null ? '–' : num(x.crt, 1) + ' s') + '</td><td>' + signed(x.tsi) + '</td><td>' + signed(x.giri) + '</td></tr>').join('')
    : '<tr><td colspan="8" class="empty">No results</td></tr>';
}

async function loadPlayers() {
  const r = await fetch('/api/players');
  if (!r.ok) return;
  const players = await r.json();
  const tbody = document.getElementById('players-tbody');
  tbody.innerHTML = players.length
    ? players.slice(0, 25).map(p => '<tr><td>' + esc(p.player_name ?? p.player_id) + '</td><td>' + esc(p.team_name ?? '–') + '</td><td>' + p.events + '</td><td>' + (p.mean_crt == null ? '–' : num(p.mean_crt, 1) + ' s') + '</td><td>' + signed(p.mean_tsi) + '</td></tr>').join('')
    : '<tr><td colspan="5" class="empty">No players</td></tr>';
}

async function loadRuns() {
  const r = await fetch('/api/runs');
  if (!r.ok) return;
  const runs = await r.json();
  const tbody = document.getElementById('runs-tbody');
  tbody.innerHTML = runs.length
    ? runs.map(x => '<tr><td>' + new Date(x.finished_at).toLocaleString() + '</td><td>' + esc(x.data_source) + '</td><td>' + x.window_secs + ' s</td><td>' + x.matches + '</td><td>' + x.failed_matches + '</td><td>' + x.events + '</td><td>' + x.players_with_baseline + '</td></tr>').join('')
    : '<tr><td colspan="7" class="empty">No runs yet</td></tr>';
}

async function loadAll() {
  await loadSummary();
  await Promise.all([loadResults(), loadPlayers(), loadRuns()]);
  document.getElementById('last-updated').textContent = 'Updated ' + new Date().toLocaleTimeString();
}

document.getElementById('window-badge').textContent = 'Window ' + document.body.dataset.window + ' s';
loadAll();
</script>
</body>
</html>"#;
