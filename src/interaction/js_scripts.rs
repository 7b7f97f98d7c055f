//! JavaScript evaluated in the page by the interaction engine

use crate::config::InteractionPolicy;
use crate::utils::MAX_DISCOVERED_CANDIDATES;

/// Elements that are clickable by nature
pub const CLICKABLE_SELECTOR: &str =
    "a,button,[role=button],[onclick],input[type=button],input[type=submit]";

/// Build the candidate discovery script for a policy.
///
/// The script returns an array of
/// `{ selector, reason, tag, text, href }` objects in discovery order.
#[must_use]
pub fn discovery_script(policy: &InteractionPolicy) -> String {
    // serde_json string literals are valid JavaScript string literals
    let theme = serde_json::to_string(&policy.theme_pattern()).unwrap_or_else(|_| "\"(?!)\"".into());
    let modal = serde_json::to_string(&policy.modal_pattern()).unwrap_or_else(|_| "\"(?!)\"".into());
    let clickable = serde_json::to_string(CLICKABLE_SELECTOR).unwrap_or_default();

    format!(
        r#"
    (() => {{
        const theme = new RegExp({theme}, 'i');
        const modal = new RegExp({modal}, 'i');
        const found = [];
        const esc = (s) => (window.CSS && CSS.escape) ? CSS.escape(s) : s;

        const push = (el, reason) => {{
            const rect = el.getBoundingClientRect();
            if (rect.width < 1 || rect.height < 1) return;
            const tag = el.tagName.toLowerCase();
            let selector;
            if (el.id) {{
                selector = '#' + esc(el.id);
            }} else {{
                const classes = (typeof el.className === 'string' ? el.className : '')
                    .trim().split(/\s+/).filter(Boolean).slice(0, 3).map(esc);
                selector = tag + (classes.length ? '.' + classes.join('.') : '');
            }}
            const href = (tag === 'a' || tag === 'area') ? el.getAttribute('href') : null;
            found.push({{
                selector,
                reason,
                tag,
                text: (el.innerText || '').slice(0, 80),
                href
            }});
        }};

        document.querySelectorAll({clickable}).forEach(el => push(el, 'generic'));
        document.querySelectorAll('*').forEach(el => {{
            const signature = [
                el.id || '',
                typeof el.className === 'string' ? el.className : '',
                el.getAttribute('aria-label') || '',
                el.innerText || ''
            ].join(' ');
            if (theme.test(signature)) push(el, 'theme-guess');
            if (modal.test(signature)) push(el, 'modal-guess');
        }});

        return found.slice(0, {MAX_DISCOVERED_CANDIDATES});
    }})()
"#
    )
}

/// Script clicking the first anchor whose raw `href` attribute equals
/// `raw_href`. Evaluates to `true` when an anchor was clicked.
#[must_use]
pub fn anchor_click_script(raw_href: &str) -> String {
    let literal = serde_json::to_string(raw_href).unwrap_or_else(|_| "\"\"".into());
    format!(
        r#"
    (() => {{
        const target = {literal};
        const anchor = Array.from(document.querySelectorAll('a[href]'))
            .find(a => a.getAttribute('href') === target);
        if (!anchor) return false;
        anchor.click();
        return true;
    }})()
"#
    )
}
