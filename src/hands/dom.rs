//! Scripts injected into the page to read its structure and to perform the
//! pointer gestures CDP has no single call for.

use super::SurfaceError;

/// Max characters of element listing handed to the oracle.
pub const DOM_SNAPSHOT_MAX_CHARS: usize = 8000;
/// Max characters of accessibility listing handed to the oracle.
pub const AX_TREE_MAX_CHARS: usize = 4000;

/// Produces a compact one-line-per-element listing of the visible page.
///
/// Non-destructive apart from tagging interactive elements with a
/// `data-agent-id` attribute, so each listed element carries a selector the
/// oracle can hand straight back:
///   1. Skips script, style, noscript, svg and link elements.
///   2. Walks the visible tree (max depth 15).
///   3. Lists interactive elements (a, button, input, textarea, select, [role=button])
///      with a `selector=` the dispatcher can resolve.
///   4. Lists short leaf text nodes for context.
pub const SNAPSHOT_JS: &str = r#"
(() => {
  const SKIP = new Set(['SCRIPT','STYLE','NOSCRIPT','SVG','LINK']);
  let id = 0;
  const lines = [];
  const seen = new Set();

  function isVisible(el) {
    if (el.offsetParent === null && el.tagName !== 'BODY' && el.tagName !== 'HTML') return false;
    const s = getComputedStyle(el);
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
  }

  function selectorFor(el) {
    if (el.id && /^[A-Za-z][\w-]*$/.test(el.id)) return '#' + el.id;
    const aid = 'e' + (id++);
    el.setAttribute('data-agent-id', aid);
    return '[data-agent-id="' + aid + '"]';
  }

  function walk(node, depth) {
    if (depth > 15) return;
    for (const child of node.children) {
      if (SKIP.has(child.tagName)) continue;
      if (!isVisible(child)) continue;
      const tag = child.tagName.toLowerCase();
      const interactive = ['a','button','input','textarea','select'].includes(tag)
        || child.getAttribute('role') === 'button';

      if (interactive) {
        let desc = tag;
        const text = (child.textContent || '').trim().slice(0, 60);
        if (tag === 'input' || tag === 'textarea') {
          desc += ' type=' + (child.type || 'text');
          if (child.placeholder) desc += ' placeholder="' + child.placeholder + '"';
          if (child.name) desc += ' name=' + child.name;
          if (child.value) desc += ' value="' + String(child.value).slice(0, 30) + '"';
        } else if (tag === 'select') {
          desc += ' [' + [...child.options].map(o => o.text.trim().slice(0, 20)).join('|') + ']';
        } else if (text) {
          desc += ' "' + text + '"';
        }
        const line = desc + ' selector=' + selectorFor(child);
        if (!seen.has(desc)) {
          seen.add(desc);
          lines.push(line);
        }
      } else {
        const text = child.textContent ? child.textContent.trim() : '';
        if (text && text.length > 2 && text.length < 200 && child.children.length === 0) {
          const t = text.slice(0, 100);
          if (!seen.has(t)) {
            seen.add(t);
            lines.push('  "' + t + '"');
          }
        }
      }
      walk(child, depth + 1);
    }
  }

  if (document.body) walk(document.body, 0);
  return lines.join('\n');
})()
"#;

/// Produces an indented role/name outline of the page's landmarks and controls.
pub const ACCESSIBILITY_JS: &str = r#"
(() => {
  const IMPLICIT = {
    A: 'link', BUTTON: 'button', INPUT: 'textbox', TEXTAREA: 'textbox', SELECT: 'combobox',
    NAV: 'navigation', MAIN: 'main', HEADER: 'banner', FOOTER: 'contentinfo', FORM: 'form',
    H1: 'heading', H2: 'heading', H3: 'heading', IMG: 'img', UL: 'list', LI: 'listitem',
  };
  const lines = [];

  function roleOf(el) {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit;
    if (el.tagName === 'INPUT' && ['checkbox','radio','submit','button'].includes(el.type)) {
      return el.type === 'submit' ? 'button' : el.type;
    }
    return IMPLICIT[el.tagName] || '';
  }

  function nameOf(el) {
    return (el.getAttribute('aria-label') || el.getAttribute('alt') || el.getAttribute('title')
      || el.getAttribute('placeholder') || (el.textContent || '').trim()).slice(0, 60);
  }

  function walk(el, depth) {
    if (depth > 20) return;
    const rect = el.getBoundingClientRect();
    const role = roleOf(el);
    let next = depth;
    if (role && rect.width > 0 && rect.height > 0) {
      let line = '  '.repeat(depth) + role + ' "' + nameOf(el) + '"';
      if ('value' in el && el.value) line += ' value="' + String(el.value).slice(0, 30) + '"';
      if (el.disabled) line += ' disabled';
      lines.push(line);
      next = depth + 1;
    }
    for (const child of el.children) walk(child, next);
  }

  if (document.body) walk(document.body, 0);
  return lines.join('\n');
})()
"#;

/// Clip an extracted listing so a heavy page cannot blow up the oracle request.
pub fn clip_snapshot(raw: String, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((idx, _)) => format!(
            "{}\n... [truncated, {} total chars]",
            &raw[..idx],
            raw.chars().count()
        ),
        None => raw,
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Dispatch `mousedown` or `mouseup` at the centre of the element.
/// Evaluates to `'NOT_FOUND'` when the selector does not resolve.
pub fn mouse_event_script(selector: &str, event: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return 'NOT_FOUND';
  const r = el.getBoundingClientRect();
  el.dispatchEvent(new MouseEvent({event}, {{ bubbles: true, cancelable: true, clientX: r.left + r.width / 2, clientY: r.top + r.height / 2 }}));
  return 'OK';
}})()"#,
        sel = js_string(selector),
        event = js_string(event),
    )
}

/// Drag `source` onto a selector, by `up`/`down` 300px, or by an `x,y` offset.
/// Evaluates to `'NOT_FOUND'` when the source does not resolve and to
/// `'TARGET_NOT_FOUND'` when a target selector does not.
pub fn drag_script(source: &str, target: &str) -> String {
    let destination = match target.trim() {
        "down" => "const endX = startX; const endY = startY + 300;".to_string(),
        "up" => "const endX = startX; const endY = startY - 300;".to_string(),
        other => match parse_offset(other) {
            Some((dx, dy)) => format!("const endX = startX + {dx}; const endY = startY + {dy};"),
            None => format!(
                "const dst = document.querySelector({});\n  if (!dst) return 'TARGET_NOT_FOUND';\n  const t = dst.getBoundingClientRect();\n  const endX = t.left + t.width / 2; const endY = t.top + t.height / 2;",
                js_string(other)
            ),
        },
    };

    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return 'NOT_FOUND';
  const r = el.getBoundingClientRect();
  const startX = r.left + r.width / 2;
  const startY = r.top + r.height / 2;
  {destination}
  const opts = (x, y) => ({{ bubbles: true, cancelable: true, clientX: x, clientY: y }});
  el.dispatchEvent(new MouseEvent('mousedown', opts(startX, startY)));
  window.dispatchEvent(new MouseEvent('mousemove', opts(endX, endY)));
  window.dispatchEvent(new MouseEvent('mouseup', opts(endX, endY)));
  return 'OK';
}})()"#,
        sel = js_string(source),
    )
}

/// Map a gesture script's return value to the element that failed to resolve.
pub fn gesture_result(
    outcome: &str,
    selector: &str,
    target: Option<&str>,
) -> Result<(), SurfaceError> {
    match (outcome, target) {
        ("NOT_FOUND", _) => Err(SurfaceError::ElementNotFound(selector.to_string())),
        ("TARGET_NOT_FOUND", Some(target)) => {
            Err(SurfaceError::ElementNotFound(target.to_string()))
        }
        _ => Ok(()),
    }
}

fn parse_offset(target: &str) -> Option<(i64, i64)> {
    let (x, y) = target.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

pub fn scroll_script(pixels: i64) -> String {
    format!("window.scrollBy(0, {pixels})")
}
