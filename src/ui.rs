use chrono::NaiveDate;

pub fn render_index(today: NaiveDate) -> String {
    INDEX_HTML
        .replace("{{STYLE}}", SHARED_STYLE)
        .replace("{{TODAY}}", &today.format("%Y-%m-%d").to_string())
}

pub fn render_analytics(today: NaiveDate) -> String {
    ANALYTICS_HTML
        .replace("{{STYLE}}", SHARED_STYLE)
        .replace("{{TODAY}}", &today.format("%Y-%m-%d").to_string())
}

const SHARED_STYLE: &str = r##"
    :root {
      --bg: #111827;
      --card: #1f2937;
      --card-2: #273244;
      --line: #374151;
      --ink: #f9fafb;
      --muted: #9ca3af;
      --done: #22c55e;
      --partial: #eab308;
      --idle: #4b5563;
      --error: #f87171;
      --accent: #3b82f6;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", "Segoe UI", "Helvetica Neue", sans-serif;
    }

    a {
      color: var(--accent);
    }

    header.top {
      display: flex;
      align-items: center;
      justify-content: space-between;
      padding: 16px 24px;
      border-bottom: 1px solid var(--line);
    }

    header.top h1 {
      margin: 0;
      font-size: 1.2rem;
      font-weight: 300;
    }

    .progress {
      display: grid;
      gap: 6px;
    }

    .progress .row {
      display: flex;
      justify-content: space-between;
      font-size: 0.85rem;
      color: var(--muted);
    }

    .progress .track {
      height: 8px;
      border-radius: 999px;
      background: var(--line);
      overflow: hidden;
    }

    .progress .fill {
      height: 100%;
      width: 0;
      background: var(--idle);
      transition: width 300ms ease-out;
    }

    .progress[data-level="partial"] .fill { background: var(--partial); }
    .progress[data-level="done"] .fill { background: var(--done); }

    .error {
      color: var(--error);
      font-size: 0.85rem;
      min-height: 1.1em;
    }
"##;

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>PercentDone</title>
  <style>
{{STYLE}}
    main.days {
      display: grid;
      grid-auto-flow: column;
      grid-auto-columns: minmax(240px, 1fr);
      gap: 18px;
      padding: 18px 24px;
      overflow-x: auto;
      min-height: calc(100vh - 170px);
    }

    .day {
      background: var(--card);
      border: 1px solid var(--line);
      border-radius: 14px;
      padding: 18px;
      display: flex;
      flex-direction: column;
      gap: 12px;
      min-height: 0;
    }

    .day h2 {
      margin: 0;
      font-size: 1rem;
      font-weight: 500;
    }

    .day .sub {
      color: var(--muted);
      font-size: 0.8rem;
    }

    .day form {
      display: flex;
      gap: 8px;
    }

    .day input[type="text"] {
      flex: 1;
      background: var(--card-2);
      border: 1px solid var(--line);
      border-radius: 8px;
      color: var(--ink);
      padding: 8px 10px;
    }

    button, select {
      background: var(--card-2);
      color: var(--ink);
      border: 1px solid var(--line);
      border-radius: 8px;
      padding: 6px 10px;
      cursor: pointer;
    }

    .toolbar {
      display: flex;
      justify-content: space-between;
      align-items: center;
      font-size: 0.8rem;
      color: var(--muted);
    }

    ul.todos {
      list-style: none;
      margin: 0;
      padding: 0;
      display: grid;
      gap: 8px;
      overflow-y: auto;
    }

    ul.todos li {
      background: var(--card-2);
      border-radius: 8px;
      padding: 10px;
      display: flex;
      align-items: center;
      gap: 10px;
    }

    ul.todos li .task {
      flex: 1;
      word-break: break-word;
    }

    ul.todos li.completed .task {
      text-decoration: line-through;
      color: var(--muted);
    }

    ul.todos li.pending {
      opacity: 0.6;
    }

    ul.todos li button {
      padding: 2px 8px;
      font-size: 0.75rem;
    }

    .empty {
      color: var(--muted);
      text-align: center;
      padding: 18px 0;
    }

    footer {
      position: sticky;
      bottom: 0;
      background: var(--bg);
      border-top: 1px solid var(--line);
      padding: 14px 24px;
    }
  </style>
</head>
<body>
  <header class="top">
    <h1>PercentDone</h1>
    <a href="/analytics">Analytics</a>
  </header>

  <main class="days" id="days"></main>

  <footer>
    <div class="progress" id="today-progress" data-level="idle">
      <div class="row"><span>Today's Progress</span><span id="today-label">0% &bull; 0/0</span></div>
      <div class="track"><div class="fill" id="today-fill"></div></div>
    </div>
  </footer>

  <script>
    const TODAY = '{{TODAY}}';
    const daysEl = document.getElementById('days');
    const views = new Map();

    const layoutFor = (width) => (width < 768 ? 'mobile' : width < 1024 ? 'tablet' : 'desktop');

    const sessionHeaders = () => {
      const headers = { 'content-type': 'application/json' };
      const raw = window.localStorage.getItem('percentdone.session');
      if (raw) {
        try {
          const session = JSON.parse(raw);
          if (session.access_token && session.user_id) {
            headers.authorization = `Bearer ${session.access_token}`;
            headers['x-user-id'] = session.user_id;
          }
        } catch (_) {
          window.localStorage.removeItem('percentdone.session');
        }
      }
      return headers;
    };

    const api = async (method, path, body) => {
      const res = await fetch(path, {
        method,
        headers: sessionHeaders(),
        body: body === undefined ? undefined : JSON.stringify(body)
      });
      if (!res.ok) {
        const msg = await res.text();
        throw new Error(msg || 'Request failed');
      }
      return res.json();
    };

    const countsOf = (todos) => ({
      completed: todos.filter((todo) => todo.completed).length,
      total: todos.length
    });

    const percentOf = ({ completed, total }) => (total > 0 ? Math.round((completed / total) * 100) : 0);

    const renderProgress = (progress) => {
      const pct = percentOf(progress);
      document.getElementById('today-label').textContent = `${pct}% • ${progress.completed}/${progress.total}`;
      document.getElementById('today-fill').style.width = `${pct}%`;
      document.getElementById('today-progress').dataset.level = pct === 100 ? 'done' : pct > 0 ? 'partial' : 'idle';
    };

    const sorted = (view) =>
      [...view.todos].sort((a, b) => {
        const diff = new Date(a.created_at) - new Date(b.created_at);
        return view.sort === 'recent' ? -diff : diff;
      });

    const showError = (view, message, ms) => {
      view.error = message;
      clearTimeout(view.errorTimer);
      view.errorTimer = setTimeout(() => {
        view.error = null;
        render(view);
      }, ms);
      render(view);
    };

    const setTodos = (view, todos) => {
      view.todos = todos;
      render(view);
      if (view.date === TODAY) {
        renderProgress(countsOf(todos));
      }
    };

    const reload = async (view) => {
      try {
        const day = await api('GET', `/api/days/${view.date}/todos`);
        setTodos(view, day.todos);
      } catch (err) {
        showError(view, 'Failed to load todos', 5000);
      }
    };

    // Apply locally first, then let the server answer decide.
    const mutate = async (view, optimistic, request, failure) => {
      const previous = view.todos;
      setTodos(view, optimistic);
      try {
        const day = await request();
        setTodos(view, day.todos);
      } catch (err) {
        setTodos(view, previous);
        showError(view, failure, 5000);
        reload(view);
      }
    };

    const addTodo = (view, task) => {
      if (!task.trim()) {
        showError(view, 'Please enter a todo task', 3000);
        return;
      }
      const temp = {
        id: `temp_${Date.now()}`,
        task: task.trim(),
        completed: false,
        created_at: new Date().toISOString(),
        todo_date: view.date
      };
      mutate(
        view,
        [temp, ...view.todos],
        () => api('POST', `/api/days/${view.date}/todos`, { task }),
        'Failed to save todo. Please try again.'
      );
    };

    const toggleTodo = (view, id) =>
      mutate(
        view,
        view.todos.map((todo) => (todo.id === id ? { ...todo, completed: !todo.completed } : todo)),
        () => api('POST', `/api/days/${view.date}/todos/${encodeURIComponent(id)}/toggle`),
        'Failed to update todo'
      );

    const deleteTodo = (view, id) =>
      mutate(
        view,
        view.todos.filter((todo) => todo.id !== id),
        () => api('DELETE', `/api/days/${view.date}/todos/${encodeURIComponent(id)}`),
        'Failed to delete todo'
      );

    const editTodo = (view, todo) => {
      const next = window.prompt('Edit task', todo.task);
      if (next === null || next.trim() === todo.task) {
        return;
      }
      if (!next.trim()) {
        showError(view, 'Please enter a todo task', 3000);
        return;
      }
      mutate(
        view,
        view.todos.map((item) => (item.id === todo.id ? { ...item, task: next.trim() } : item)),
        () => api('PATCH', `/api/days/${view.date}/todos/${encodeURIComponent(todo.id)}`, { task: next }),
        'Failed to edit todo'
      );
    };

    const el = (tag, props = {}, children = []) => {
      const node = document.createElement(tag);
      Object.assign(node, props);
      children.forEach((child) => node.append(child));
      return node;
    };

    const render = (view) => {
      const list = el('ul', { className: 'todos' });
      const items = sorted(view);
      if (!items.length) {
        list.append(el('li', { className: 'empty', textContent: view.date === TODAY ? 'No tasks yet - start your day!' : 'No tasks for this day' }));
      }
      items.forEach((todo) => {
        const classes = [todo.completed ? 'completed' : '', todo.id.startsWith('temp_') ? 'pending' : ''].join(' ');
        list.append(
          el('li', { className: classes }, [
            el('input', { type: 'checkbox', checked: todo.completed, onchange: () => toggleTodo(view, todo.id) }),
            el('span', { className: 'task', textContent: todo.task }),
            el('button', { type: 'button', textContent: 'Edit', onclick: () => editTodo(view, todo) }),
            el('button', { type: 'button', textContent: 'Delete', onclick: () => deleteTodo(view, todo.id) })
          ])
        );
      });

      const input = el('input', { type: 'text', placeholder: 'Add a task...' });
      const form = el('form', {
        onsubmit: (event) => {
          event.preventDefault();
          addTodo(view, input.value);
          input.value = '';
        }
      }, [input, el('button', { type: 'submit', textContent: 'Add' })]);

      const sort = el('select', { onchange: (event) => { view.sort = event.target.value; render(view); } }, [
        el('option', { value: 'earliest', textContent: 'Earliest' }),
        el('option', { value: 'recent', textContent: 'Recent' })
      ]);
      sort.value = view.sort;

      const label = new Date(`${view.date}T00:00:00Z`).toLocaleDateString(undefined, {
        weekday: 'long', month: 'short', day: 'numeric', timeZone: 'UTC'
      });
      const count = view.todos.length;
      view.node.replaceChildren(
        el('h2', { textContent: view.date === TODAY ? `Today · ${label}` : label }),
        form,
        el('div', { className: 'error', textContent: view.error || '' }),
        el('div', { className: 'toolbar' }, [
          el('span', {}, ['Sort: ', sort]),
          el('span', { textContent: `${count} task${count === 1 ? '' : 's'}` })
        ]),
        view.loading && !count ? el('div', { className: 'empty', textContent: 'Loading...' }) : list
      );
    };

    const mount = async () => {
      await api('POST', '/api/housekeeping').catch(() => {});
      const dashboard = await api('GET', `/api/dashboard?layout=${layoutFor(window.innerWidth)}`);
      renderProgress(dashboard.today_progress);
      daysEl.replaceChildren();
      views.clear();
      for (const date of dashboard.dates) {
        const view = { date, todos: [], sort: 'earliest', error: null, loading: true, node: el('section', { className: 'day' }) };
        views.set(date, view);
        daysEl.append(view.node);
        render(view);
        reload(view).finally(() => {
          view.loading = false;
          render(view);
        });
      }
    };

    const listen = () => {
      const source = new EventSource('/api/events');
      source.addEventListener('todoUpdatedOptimistic', (event) => {
        const data = JSON.parse(event.data);
        const view = views.get(data.date);
        if (view) {
          setTodos(view, data.todos);
        }
      });
      source.addEventListener('todoUpdated', (event) => {
        const data = JSON.parse(event.data);
        const view = views.get(data.date);
        if (view) {
          reload(view);
        }
      });
    };

    let lastLayout = layoutFor(window.innerWidth);
    window.addEventListener('resize', () => {
      const layout = layoutFor(window.innerWidth);
      if (layout !== lastLayout) {
        lastLayout = layout;
        mount();
      }
    });

    mount().then(listen).catch((err) => console.error(err));
  </script>
</body>
</html>
"##;

const ANALYTICS_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>PercentDone &middot; Analytics</title>
  <style>
{{STYLE}}
    main {
      width: min(880px, 100%);
      margin: 0 auto;
      padding: 24px;
      display: grid;
      gap: 20px;
    }

    .cards {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .card {
      background: var(--card);
      border: 1px solid var(--line);
      border-radius: 14px;
      padding: 18px;
      text-align: center;
    }

    .card .value {
      font-size: 2rem;
      font-weight: 600;
    }

    .card .label {
      color: var(--muted);
      font-size: 0.85rem;
    }

    #chart {
      width: 100%;
      height: 260px;
      display: block;
    }

    #chart text {
      fill: var(--muted);
      font-size: 11px;
    }

    .breakdown {
      display: grid;
      gap: 8px;
    }

    .breakdown .row {
      display: flex;
      justify-content: space-between;
      background: var(--card-2);
      border-radius: 8px;
      padding: 10px 14px;
    }

    .breakdown .row.today {
      border: 1px solid var(--accent);
    }

    .breakdown small {
      color: var(--muted);
      display: block;
    }
  </style>
</head>
<body>
  <header class="top">
    <h1>Analytics</h1>
    <a href="/">&larr; Back to Dashboard</a>
  </header>

  <main>
    <section class="cards">
      <div class="card"><div class="value" id="active-days">0</div><div class="label">Active Days</div></div>
      <div class="card"><div class="value" id="average">0%</div><div class="label">Average Completion</div></div>
      <div class="card"><div class="value" id="total">0</div><div class="label">Total Todos</div></div>
    </section>

    <section class="card">
      <svg id="chart" viewBox="0 0 600 260" aria-label="Completion by day" role="img"></svg>
    </section>

    <section class="card">
      <h3>Daily Breakdown</h3>
      <div class="breakdown" id="breakdown"></div>
    </section>

    <div class="error" id="status"></div>
  </main>

  <script>
    const TODAY = '{{TODAY}}';
    const chartEl = document.getElementById('chart');

    const headers = () => {
      const out = {};
      const raw = window.localStorage.getItem('percentdone.session');
      if (raw) {
        try {
          const session = JSON.parse(raw);
          out.authorization = `Bearer ${session.access_token}`;
          out['x-user-id'] = session.user_id;
        } catch (_) {}
      }
      return out;
    };

    const colorFor = (pct) => (pct === 100 ? '#22c55e' : pct > 0 ? '#eab308' : '#4b5563');

    const renderChart = (days) => {
      const width = 600;
      const height = 260;
      const padX = 40;
      const padBottom = 34;
      const top = 20;
      const slot = (width - padX * 2) / days.length;
      const barWidth = slot * 0.6;
      const scale = (height - top - padBottom) / 100;

      let svg = '';
      [0, 25, 50, 75, 100].forEach((tick) => {
        const y = height - padBottom - tick * scale;
        svg += `<line x1="${padX}" y1="${y}" x2="${width - padX}" y2="${y}" stroke="#374151" />`;
        svg += `<text x="${padX - 8}" y="${y + 4}" text-anchor="end">${tick}%</text>`;
      });
      days.forEach((day, index) => {
        const pct = day.completion_percentage;
        const x = padX + index * slot + (slot - barWidth) / 2;
        const h = pct * scale;
        const y = height - padBottom - h;
        svg += `<rect x="${x}" y="${y}" width="${barWidth}" height="${h}" rx="4" fill="${colorFor(pct)}" />`;
        svg += `<text x="${x + barWidth / 2}" y="${height - padBottom + 16}" text-anchor="middle">${day.day_name}</text>`;
        svg += `<text x="${x + barWidth / 2}" y="${y - 6}" text-anchor="middle">${pct}%</text>`;
      });
      chartEl.innerHTML = svg;
    };

    const renderBreakdown = (days) => {
      const rows = days.map((day) => {
        const row = document.createElement('div');
        row.className = day.date === TODAY ? 'row today' : 'row';
        const left = document.createElement('div');
        left.textContent = `${day.day_name}${day.date === TODAY ? ' (Today)' : ''}`;
        const date = document.createElement('small');
        date.textContent = day.date;
        left.append(date);
        const right = document.createElement('div');
        right.textContent = `${day.completion_percentage}%`;
        right.style.color = colorFor(day.completion_percentage);
        const counts = document.createElement('small');
        counts.textContent = `${day.completed_todos}/${day.total_todos} todos`;
        right.append(counts);
        row.append(left, right);
        return row;
      });
      document.getElementById('breakdown').replaceChildren(...rows);
    };

    const load = async () => {
      const res = await fetch('/api/analytics/weekly', { headers: headers() });
      if (!res.ok) {
        throw new Error((await res.text()) || 'Failed to load analytics data. Please try again.');
      }
      const data = await res.json();
      document.getElementById('active-days').textContent = data.summary.active_days;
      document.getElementById('average').textContent = `${data.summary.average_completion}%`;
      document.getElementById('total').textContent = data.summary.total_todos;
      renderChart(data.days);
      renderBreakdown(data.days);
    };

    load().catch((err) => {
      document.getElementById('status').textContent = err.message;
    });
  </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_carry_today_and_styles() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let index = render_index(today);
        assert!(index.contains("const TODAY = '2026-03-01';"));
        assert!(!index.contains("{{STYLE}}"));
        let analytics = render_analytics(today);
        assert!(analytics.contains("/api/analytics/weekly"));
        assert!(!analytics.contains("{{TODAY}}"));
    }

    #[test]
    fn pages_render_through_closing_tag() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let analytics = render_analytics(today);
        assert!(analytics.contains(r##"stroke="#374151""##));
        assert!(analytics.trim_end().ends_with("</html>"));
        assert!(render_index(today).trim_end().ends_with("</html>"));
    }
}
