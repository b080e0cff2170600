//! Sandbox preview document assembly.
//!
//! Two documents come out of this module. `render_document` produces one
//! self-contained HTML page embedding the current partition plus the VA
//! component runtime, React, and Babel; each render fully replaces prior
//! content. `render_shell` produces the host page that loads that document
//! in an iframe with `sandbox="allow-scripts"`. The sandbox communicates
//! with its host only via `postMessage` (`preview-loaded` /
//! `preview-error`), renders every failure mode as an inline banner so it
//! never shows a blank page, and the host carries its own watchdog for a
//! sandbox that never reports back.

use crate::codegen::CodePartition;

/// Milliseconds before the embedded watchdog reports a stalled load.
const WATCHDOG_MS: u32 = 5000;

const CSS_SLOT: &str = "/*@CSS@*/";
const HTML_SLOT: &str = "<!--@HTML@-->";
const JS_SLOT: &str = "/*@JS@*/";
const WATCHDOG_SLOT: &str = "@WATCHDOG_MS@";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>VA Component Preview</title>

  <link rel="stylesheet" href="https://unpkg.com/@department-of-veterans-affairs/web-components/dist/main.css">

  <script>
    window.onerror = function(message, source, lineno, colno, error) {
      console.error('Preview error:', message, error);
      document.querySelector('body').innerHTML +=
        '<div style="color: red; padding: 1rem; background: rgba(255,0,0,0.1); margin: 1rem; border: 1px solid red;">' +
        '<strong>Preview Error:</strong> ' + message + '</div>';
      window.parent.postMessage('preview-error', '*');
      return true;
    };
  </script>

  <style>
    /*@CSS@*/

    body {
      background-color: white;
      color: #323a45;
      font-family: Source Sans Pro, Helvetica Neue, Helvetica, Roboto, Arial, sans-serif;
    }
  </style>

  <script src="https://unpkg.com/react@18/umd/react.development.js"></script>
  <script src="https://unpkg.com/react-dom@18/umd/react-dom.development.js"></script>
  <script src="https://unpkg.com/@babel/standalone/babel.min.js"></script>

  <script type="module">
    (async () => {
      try {
        const { defineCustomElements } = await import('https://unpkg.com/@department-of-veterans-affairs/web-components@latest/loader/index.js');
        await defineCustomElements();
        document.dispatchEvent(new CustomEvent('va-components-ready'));
        window.parent.postMessage('preview-loaded', '*');
      } catch (err) {
        console.error('Error loading VA components:', err);
        window.parent.postMessage('preview-error', '*');
      }
    })();
  </script>
</head>
<body style="background-color: white;">
  <div id="root"><!--@HTML@--></div>

  <script type="text/babel" data-presets="react,env" id="user-code">
    (function() {
      // First readiness signal wins; the entry point runs exactly once.
      let rendered = false;

      const renderUserApp = () => {
        if (rendered) return;
        rendered = true;
        try {
          const { useState, useEffect, useRef, useCallback, useMemo, useContext } = React;

          /*@JS@*/

          const rootElement = document.getElementById('root');
          if (rootElement && typeof App === 'function') {
            try {
              if (typeof ReactDOM.createRoot === 'function') {
                window._reactRoot = ReactDOM.createRoot(rootElement);
                window._reactRoot.render(React.createElement(App));
              } else {
                ReactDOM.render(React.createElement(App), rootElement);
              }
            } catch (err) {
              console.error('Error rendering App:', err);
              rootElement.innerHTML = '<div style="color: red; padding: 1rem; background: rgba(255,0,0,0.1); border: 1px solid red;">Error rendering component: ' + err.message + '</div>';
              window.parent.postMessage('preview-error', '*');
            }
          } else if (!rootElement) {
            document.body.innerHTML += '<div style="color: red; padding: 1rem; background: rgba(255,0,0,0.1); border: 1px solid red;">Error: No root element found.</div>';
            window.parent.postMessage('preview-error', '*');
          } else {
            // Entry point missing or not callable: render a fallback UI
            // instead of leaving the sandbox blank.
            const Fallback = () => React.createElement('div', {
              className: 'vads-l-grid-container vads-u-padding--3'
            }, React.createElement('va-alert', {
              status: 'error',
              visible: true
            }, [
              React.createElement('span', { slot: 'headline', key: 'headline' }, 'App Function Missing'),
              React.createElement('p', { key: 'message' }, 'Your code needs to define an App function component. Please check your JavaScript code and ensure a proper App component is defined.')
            ]));
            if (typeof ReactDOM.createRoot === 'function') {
              window._reactRoot = ReactDOM.createRoot(rootElement);
              window._reactRoot.render(React.createElement(Fallback));
            } else {
              ReactDOM.render(React.createElement(Fallback), rootElement);
            }
          }
        } catch (err) {
          console.error('Script error:', err);
          document.body.innerHTML += '<div style="color: red; padding: 1rem; background: rgba(255,0,0,0.1); border: 1px solid red;">Script error: ' + err.message + '</div>';
          window.parent.postMessage('preview-error', '*');
        }
      };

      if (document.readyState === 'complete' || document.readyState === 'interactive') {
        setTimeout(renderUserApp, 100);
      } else {
        document.addEventListener('DOMContentLoaded', () => {
          setTimeout(renderUserApp, 100);
        });
      }

      document.addEventListener('va-components-ready', renderUserApp);

      // Watchdog: report a stalled load so the host can clear its spinner.
      setTimeout(() => {
        if (!rendered) {
          window.parent.postMessage('preview-error', '*');
        }
      }, @WATCHDOG_MS@);
    })();
  </script>
</body>
</html>
"#;

const PREVIEW_URL_SLOT: &str = "@PREVIEW_URL@";

const SHELL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>VA Component Studio</title>
  <style>
    body {
      margin: 0;
      font-family: Source Sans Pro, Helvetica Neue, Helvetica, Roboto, Arial, sans-serif;
    }
    .preview-status {
      padding: 1rem;
      color: #323a45;
    }
    .preview-status.error {
      color: #b50909;
      background: rgba(255, 0, 0, 0.1);
      border: 1px solid #b50909;
      margin: 1rem;
    }
    .preview-status.hidden {
      display: none;
    }
    .preview-frame {
      width: 100%;
      height: 100vh;
      border: none;
      background: white;
    }
  </style>
</head>
<body>
  <div id="status" class="preview-status">Loading preview...</div>
  <iframe id="preview" class="preview-frame" sandbox="allow-scripts" src="@PREVIEW_URL@" title="Component preview"></iframe>

  <script>
    (function() {
      var status = document.getElementById('status');
      var settled = false;

      window.addEventListener('message', function(event) {
        if (event.data === 'preview-loaded') {
          settled = true;
          status.className = 'preview-status hidden';
        } else if (event.data === 'preview-error') {
          settled = true;
          status.textContent = 'The preview reported an error. Check the generated code.';
          status.className = 'preview-status error';
        }
      });

      // Host-side watchdog: the sandbox may never report back at all.
      setTimeout(function() {
        if (!settled) {
          status.textContent = 'The preview did not finish loading.';
          status.className = 'preview-status error';
        }
      }, @WATCHDOG_MS@);
    })();
  </script>
</body>
</html>
"#;

/// Build the full preview document for a partition.
pub fn render_document(partition: &CodePartition) -> String {
    let html = if partition.html.is_empty() {
        "<!-- No HTML content -->"
    } else {
        &partition.html
    };
    let css = if partition.css.is_empty() {
        "/* No CSS content */"
    } else {
        &partition.css
    };
    let js = if partition.js.is_empty() {
        "// No code provided"
    } else {
        &partition.js
    };

    TEMPLATE
        .replace(CSS_SLOT, css)
        .replace(HTML_SLOT, html)
        .replace(JS_SLOT, js)
        .replace(WATCHDOG_SLOT, &WATCHDOG_MS.to_string())
}

/// Build the host page that embeds the preview document in a sandboxed
/// iframe and listens for its `postMessage` signals.
pub fn render_shell(preview_url: &str) -> String {
    SHELL_TEMPLATE
        .replace(PREVIEW_URL_SLOT, preview_url)
        .replace(WATCHDOG_SLOT, &WATCHDOG_MS.to_string())
}
