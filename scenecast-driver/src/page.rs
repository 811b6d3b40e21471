//! Page scripts injected into the application
//!
//! The application renders almost everything inside nested shadow roots, so
//! every lookup goes through `deepAll`, which walks shadow trees as well as
//! the light DOM.

/// Helpers prepended to every script
const PRELUDE: &str = r#"
const deepAll = (root, selector) => {
  const found = new Set();
  const seen = new Set();
  const visit = (node) => {
    if (!node || seen.has(node)) return;
    seen.add(node);
    if (node.querySelectorAll) node.querySelectorAll(selector).forEach((el) => found.add(el));
    if (node.shadowRoot) visit(node.shadowRoot);
    if (node.childNodes) node.childNodes.forEach(visit);
  };
  visit(root);
  return Array.from(found);
};
const press = (host) => {
  const inner = host.shadowRoot ? host.shadowRoot.querySelector('button') : host.querySelector('button');
  (inner || host).click();
};
const appRoot = () => {
  const app = document.querySelector('ucs-standalone-app');
  return app && app.shadowRoot;
};
const searchForm = () => {
  const bar = deepAll(document, 'ucs-search-bar')[0];
  return bar && bar.shadowRoot && bar.shadowRoot.querySelector('form');
};
"#;

fn with_prelude(body: &str) -> String {
    format!("{}\n{}", PRELUDE, body)
}

/// `arguments[0]`: blob prefix. Returns the first matching video source or null.
pub(crate) fn find_artifact() -> String {
    with_prelude(
        r#"
const hit = deepAll(document, 'video[src^="blob:"]').find((v) => v.src && v.src.startsWith(arguments[0]));
return hit ? hit.src : null;
"#,
    )
}

/// Returns true when the provider replaced the answer with a rejection.
pub(crate) fn detect_fatal_marker() -> String {
    with_prelude("return deepAll(document, 'ucs-banned-answer').length > 0;")
}

/// Returns true when a continue/acknowledge button sits in the conversation.
pub(crate) fn detect_action_prompt() -> String {
    with_prelude(
        r#"
const root = appRoot();
return !!root && deepAll(root, 'md-filled-button').length > 0;
"#,
    )
}

/// Clicks the continue/acknowledge button. Returns false when it is gone.
pub(crate) fn click_action_prompt() -> String {
    with_prelude(
        r#"
const root = appRoot();
const button = root && deepAll(root, 'md-filled-button')[0];
if (!button) return false;
press(button);
return true;
"#,
    )
}

/// Opens the tools menu of the chat search bar.
pub(crate) fn open_tools_menu() -> String {
    with_prelude(
        r#"
const form = searchForm();
const wrapper = form && form.querySelector('.tools-button-container .tooltip-wrapper');
const button = wrapper && wrapper.querySelector('button, md-icon-button, md-text-button');
if (!button) return false;
button.click();
return true;
"#,
    )
}

/// `arguments[0]`: menu label. Picks the labelled tool, falling back to the
/// third entry the menu has historically shown the video tool at.
pub(crate) fn pick_tool() -> String {
    with_prelude(
        r#"
const items = deepAll(document, 'md-menu-item');
const item = items.find((it) => (it.innerText || '').trim().includes(arguments[0])) || items[2];
if (!item) return false;
(item.querySelector('li') || item).click();
return true;
"#,
    )
}

/// `arguments[0]`: prompt text. Writes it into the rich-text editor.
pub(crate) fn enter_prompt() -> String {
    with_prelude(
        r#"
const form = searchForm();
const editor = form && form.querySelector('ucs-prosemirror-editor');
const paragraph = editor && editor.shadowRoot && editor.shadowRoot.querySelector('p');
if (!paragraph) return false;
paragraph.innerText = arguments[0];
paragraph.dispatchEvent(new InputEvent('input', { bubbles: true }));
return true;
"#,
    )
}

/// Clicks the send button of the chat search bar.
pub(crate) fn click_send() -> String {
    with_prelude(
        r#"
const form = searchForm();
if (!form) return false;
const buttons = Array.from(form.querySelectorAll('md-icon-button'));
if (!buttons.length) return false;
const label = (el) => [el.getAttribute('aria-label'), el.getAttribute('title'), el.innerText]
  .map((s) => (s || '').toLowerCase()).join(' ');
const target = buttons.find((el) => /send|submit|search/.test(label(el))) || buttons[buttons.length - 1];
press(target);
return true;
"#,
    )
}

/// Async. `arguments[0]`: blob URL. Calls back with `{ ok, data | error }`
/// where `data` is the base64 payload.
pub(crate) const FETCH_BLOB: &str = r#"
const done = arguments[arguments.length - 1];
fetch(arguments[0])
  .then((r) => r.blob())
  .then((blob) => {
    const reader = new FileReader();
    reader.onloadend = () => done({ ok: true, data: String(reader.result).split(',')[1] || '' });
    reader.onerror = () => done({ ok: false, error: 'reader failed' });
    reader.readAsDataURL(blob);
  })
  .catch((e) => done({ ok: false, error: String(e) }));
"#;

/// `arguments[0]`: button text. Clicks the first light-DOM button containing it.
pub(crate) const CLICK_BUTTON_WITH_TEXT: &str = r#"
const target = Array.from(document.querySelectorAll('button'))
  .find((b) => (b.innerText || '').includes(arguments[0]));
if (!target) return false;
target.click();
return true;
"#;

/// Clicks "I'll do this later" on the first-run welcome dialog.
pub(crate) fn dismiss_welcome() -> String {
    with_prelude(
        r#"
const root = appRoot();
const buttons = root ? deepAll(root, 'md-text-button') : [];
const later = buttons.find((b) => {
  const inner = b.shadowRoot && b.shadowRoot.querySelector('button');
  return ((inner && inner.innerText) || b.innerText || '').includes("I'll do this later");
});
if (!later) return false;
press(later);
return true;
"#,
    )
}

/// Clears an input passed as `arguments[0]`.
pub(crate) const CLEAR_INPUT: &str = "arguments[0].value = '';";

/// Clicks an element passed as `arguments[0]` from script, bypassing overlays.
pub(crate) const FORCE_CLICK: &str = "arguments[0].click();";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_carry_prelude() {
        for script in [find_artifact(), detect_fatal_marker(), click_send(), dismiss_welcome()] {
            assert!(script.contains("const deepAll"));
        }
    }

    #[test]
    fn test_async_script_uses_callback() {
        assert!(FETCH_BLOB.contains("arguments[arguments.length - 1]"));
    }
}
