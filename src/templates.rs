//! Markup generation – resolves component partials and renders the document
//! template with `tera`.
//!
//! Templates are looked up in an ordered list of search roots (bundled root
//! first, then the caller's working directory); the first root containing a
//! template wins. Every template a document needs is resolved before anything
//! is rendered, so a missing partial is reported by its id rather than as a
//! render failure halfway through the document.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tera::{Context, Tera};

use crate::config::ForgeConfig;
use crate::document::Document;
use crate::error::{ForgeError, Result};
use crate::paths::relative_to;

/// Name of the template function that dispatches a component to its partial.
const COMPONENT_FN: &str = "component";

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// First-match template lookup over several roots.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    roots: Vec<PathBuf>,
}

impl TemplateLoader {
    /// Roots are canonicalised; roots that do not exist are skipped.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .filter_map(|root| {
                let root = root.as_ref();
                match fs::canonicalize(root) {
                    Ok(canonical) => Some(canonical),
                    Err(e) => {
                        log::debug!("skipping template root '{}': {e}", root.display());
                        None
                    }
                }
            })
            .collect();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Path of the first template named `template_id` across the roots.
    pub fn resolve(&self, template_id: &str) -> Result<PathBuf> {
        let id = Path::new(template_id);
        let candidates: Vec<PathBuf> = if id.is_absolute() {
            vec![id.to_path_buf()]
        } else {
            self.roots.iter().map(|root| root.join(id)).collect()
        };

        for candidate in candidates {
            if candidate.is_file() {
                return fs::canonicalize(&candidate).map_err(|e| ForgeError::io(&candidate, e));
            }
        }

        Err(ForgeError::TemplateResolution {
            template_id: template_id.to_string(),
            searched: self.roots.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The partials a document needs, registered in one `tera` instance.
///
/// Each requested template is registered under its path relative to the
/// bundled root, so templates from other roots get `..`-prefixed names and two
/// ids that point at the same file share one registration. Templates they
/// pull in with `include`, `extends` or `import` are resolved through the same
/// search roots and registered under the name used in the tag.
#[derive(Debug, Clone)]
pub struct PartialRegistry {
    tera: Tera,
    names: HashMap<String, String>,
}

impl PartialRegistry {
    pub fn build<'a, I>(loader: &TemplateLoader, bundled_root: &Path, template_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names = HashMap::new();
        let mut pending = VecDeque::new();

        for template_id in template_ids {
            let path = loader.resolve(template_id)?;
            let name = registration_name(&path, bundled_root)?;
            log::debug!("template '{template_id}' -> {} (as '{name}')", path.display());
            names.insert(template_id.to_string(), name.clone());
            pending.push_back((path, name));
        }

        // Breadth-first over references; a name is registered once, first match wins.
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        let mut seen = HashSet::new();
        while let Some((path, name)) = pending.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let source = fs::read_to_string(&path).map_err(|e| ForgeError::io(&path, e))?;
            for reference in template_references(&source) {
                match loader.resolve(&reference.name) {
                    Ok(found) => {
                        log::debug!("'{name}' references '{}' -> {}", reference.name, found.display());
                        pending.push_back((found, reference.name));
                    }
                    Err(e) if reference.required => return Err(e),
                    // tera reports the include itself, or skips it with `ignore missing`.
                    Err(_) => log::debug!("'{name}' includes unresolved '{}'", reference.name),
                }
            }
            files.push((path, name));
        }

        // Added in one batch so inheritance chains are built with every parent present.
        let mut tera = Tera::default();
        tera.add_template_files(
            files
                .iter()
                .map(|(path, name)| (path.as_path(), Some(name.as_str()))),
        )?;

        Ok(Self { tera, names })
    }

    /// Registered name for a template id.
    pub fn name_of(&self, template_id: &str) -> Option<&str> {
        self.names.get(template_id).map(String::as_str)
    }

    /// Every registered template name, references included.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.tera.get_template_names()
    }

    /// Render one component context with its partial.
    pub fn render_component(&self, component: &Value) -> tera::Result<String> {
        let template_id = component
            .get("template_id")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("component context has no template_id"))?;
        let name = self.name_of(template_id).ok_or_else(|| {
            tera::Error::msg(format!("template '{template_id}' was not resolved"))
        })?;

        let mut context = Context::new();
        context.insert("component", component);
        self.tera.render(name, &context)
    }
}

/// A template named inside another template's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reference {
    name: String,
    /// `extends` and `import` cannot render without their target.
    required: bool,
}

/// Names referenced by `include`, `extends` and `import` tags.
fn template_references(source: &str) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find("{%") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("%}") else { break };
        let tag = after[..end].trim_matches(|c: char| c == '-' || c.is_whitespace());
        rest = &after[end + 2..];

        let (keyword, args) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
        let (required, all) = match keyword {
            "include" => (false, true),
            "extends" => (true, false),
            "import" => (true, false),
            _ => continue,
        };
        let mut names = quoted_strings(args);
        if !all {
            names.truncate(1);
        }
        references.extend(names.into_iter().map(|name| Reference { name, required }));
    }
    references
}

fn quoted_strings(mut text: &str) -> Vec<String> {
    let mut strings = Vec::new();
    while let Some(start) = text.find(['"', '\'', '`']) {
        let quote = &text[start..start + 1];
        let body = &text[start + 1..];
        let Some(len) = body.find(quote) else { break };
        strings.push(body[..len].to_string());
        text = &body[len + 1..];
    }
    strings
}

fn registration_name(path: &Path, bundled_root: &Path) -> Result<String> {
    let relative = relative_to(path, bundled_root)?;
    // tera names are '/'-separated on every platform.
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Markup
// ---------------------------------------------------------------------------

/// Render the whole document to HTML.
///
/// `stylesheet` is the href the page uses for the compiled stylesheet.
pub fn generate_markup(document: &Document, config: &ForgeConfig, stylesheet: &str) -> Result<String> {
    let loader = TemplateLoader::new(config.template_roots());
    let bundled_root = fs::canonicalize(&config.template_root)
        .map_err(|e| ForgeError::io(&config.template_root, e))?;

    let partials = PartialRegistry::build(&loader, &bundled_root, document.template_ids())?;

    let document_template = fs::canonicalize(config.document_template())
        .map_err(|e| ForgeError::io(config.document_template(), e))?;
    let document_name = registration_name(&document_template, &bundled_root)?;

    let mut tera = Tera::default();
    tera.add_template_file(&document_template, Some(document_name.as_str()))?;
    tera.register_function(COMPONENT_FN, move |args: &HashMap<String, Value>| {
        let component = args
            .get("component")
            .ok_or_else(|| tera::Error::msg("component() requires a `component` argument"))?;
        partials.render_component(component).map(Value::String)
    });

    let context = Context::from_value(json!({
        "document": document.context()?,
        "stylesheet": stylesheet,
    }))?;
    Ok(tera.render(&document_name, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Component;
    use crate::table::Frame;
    use crate::document;
    use sha2::{Digest, Sha256};

    fn config_with_extra(root: &Path) -> ForgeConfig {
        ForgeConfig::default().with_extra_template_roots([root])
    }

    fn render(document: &Document) -> String {
        let scratch = tempfile::tempdir().unwrap();
        generate_markup(document, &config_with_extra(scratch.path()), "out.css").unwrap()
    }

    #[test]
    fn loader_prefers_earlier_roots() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("card.html"), "first").unwrap();
        fs::write(second.path().join("card.html"), "second").unwrap();
        fs::write(second.path().join("only.html"), "only").unwrap();

        let loader = TemplateLoader::new([first.path(), second.path()]);
        let card = loader.resolve("card.html").unwrap();
        assert_eq!(fs::read_to_string(card).unwrap(), "first");
        let only = loader.resolve("only.html").unwrap();
        assert_eq!(fs::read_to_string(only).unwrap(), "only");
    }

    #[test]
    fn loader_skips_missing_roots() {
        let loader = TemplateLoader::new(["/nonexistent/forge/root"]);
        assert!(loader.roots().is_empty());
    }

    #[test]
    fn missing_partial_names_the_template_id() {
        let doc = document![Component::custom("no_such_partial.html", json!({}))];
        let scratch = tempfile::tempdir().unwrap();
        let err = generate_markup(&doc, &config_with_extra(scratch.path()), "out.css").unwrap_err();
        match err {
            ForgeError::TemplateResolution { template_id, searched } => {
                assert_eq!(template_id, "no_such_partial.html");
                assert_eq!(searched.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn caller_local_template_resolves_outside_bundled_root() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(
            cwd.path().join("two_numbers.html"),
            r#"<div class="two">{{ component.number_1 }}/{{ component.number_2 }} {{ component.title }}</div>"#,
        )
        .unwrap();

        let doc = document![
            Component::title("Report"),
            [
                Component::custom("two_numbers.html", json!({"number_1": 3141, "number_2": 5926, "title": "Pi"})),
                Component::custom("two_numbers.html", json!({"number_1": 5358, "number_2": 9793, "title": "Thon"})),
            ],
        ];
        let html = generate_markup(&doc, &config_with_extra(cwd.path()), "out.css").unwrap();
        assert!(html.contains(r#"<div class="two">3141/5926 Pi</div>"#), "{html}");
        assert!(html.contains("5358/9793 Thon"));
    }

    #[test]
    fn outside_templates_get_walk_up_names() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(cwd.path().join("card.html"), "card").unwrap();
        let config = config_with_extra(cwd.path());
        let loader = TemplateLoader::new(config.template_roots());
        let root = fs::canonicalize(&config.template_root).unwrap();

        let registry = PartialRegistry::build(&loader, &root, ["card.html", "src/partials/title.html"]).unwrap();
        assert!(registry.name_of("card.html").unwrap().starts_with("../"));
        assert_eq!(registry.name_of("src/partials/title.html"), Some("src/partials/title.html"));
    }

    #[test]
    fn jagged_table_renders_empty_cells() {
        let doc = document![Component::table(vec![vec![0, 1], vec![2], vec![3, 4]], "T1")];
        let html = render(&doc);
        assert_eq!(html.matches("<tr").count(), 3, "{html}");
        assert_eq!(html.matches("<td").count(), 6);
        assert!(!html.contains("<th"));
        assert!(html.contains(r#"<td class="pf-cell"></td>"#), "{html}");
    }

    #[test]
    fn frame_headers_render_in_column_order() {
        let frame = Frame::new()
            .with_column("one", [123, 3])
            .with_column("two", ["wow", "some"])
            .with_column("0", [3, 3]);
        let html = render(&document![Component::table(frame, "Df table")]);

        let one = html.find(">one</th>").expect("header 'one'");
        let two = html.find(">two</th>").expect("header 'two'");
        let zero = html.find(">0</th>").expect("header '0'");
        assert!(one < two && two < zero);
        assert!(html.contains("wow</td>"));
    }

    #[test]
    fn text_is_escaped_but_paragraph_markup_is_kept() {
        let html = render(&document![
            Component::title("<script>alert(1)</script>"),
            Component::paragraph("<b>This</b> <i>is</i> a <b>test</b>"),
        ]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<b>This</b> <i>is</i>"));
    }

    #[test]
    fn rows_become_grids_with_spans() {
        let html = render(&document![[
            Component::title("Wide").with_col_span(2),
            Component::number(3, "n"),
        ]]);
        assert!(html.contains("grid-cols-3"), "{html}");
        assert!(html.contains("col-span-2"));
        assert!(html.contains(r#"href="out.css""#));
    }

    #[test]
    fn caller_partial_can_include_bundled_partials() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(
            cwd.path().join("wrap.html"),
            r#"<section class="wrap">{% include "src/partials/title.html" %}</section>"#,
        )
        .unwrap();

        let doc = document![Component::custom("wrap.html", json!({ "text": "Wrapped" }))];
        let html = generate_markup(&doc, &config_with_extra(cwd.path()), "out.css").unwrap();
        assert!(html.contains(r#"<section class="wrap"><h1"#), "{html}");
        assert!(html.contains("Wrapped</h1>"));
    }

    #[test]
    fn caller_partial_can_extend_and_import() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(
            cwd.path().join("card_base.html"),
            r#"<div class="card">{% block body %}{% endblock body %}</div>"#,
        )
        .unwrap();
        fs::write(
            cwd.path().join("macros.html"),
            r#"{% macro badge(label) %}<span class="badge">{{ label }}</span>{% endmacro badge %}"#,
        )
        .unwrap();
        fs::write(
            cwd.path().join("card.html"),
            r#"{% extends "card_base.html" %}{% import "macros.html" as m %}{% block body %}{{ m::badge(label=component.label) }}{% endblock body %}"#,
        )
        .unwrap();

        let doc = document![Component::custom("card.html", json!({ "label": "new" }))];
        let html = generate_markup(&doc, &config_with_extra(cwd.path()), "out.css").unwrap();
        assert!(html.contains(r#"<div class="card">"#), "{html}");
        assert!(html.contains("badge"));
        assert!(html.contains("new"));
    }

    #[test]
    fn missing_parent_template_is_a_resolution_error() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(
            cwd.path().join("orphan.html"),
            r#"{% extends "no_such_base.html" %}{% block body %}{% endblock body %}"#,
        )
        .unwrap();

        let doc = document![Component::custom("orphan.html", json!({}))];
        let err = generate_markup(&doc, &config_with_extra(cwd.path()), "out.css").unwrap_err();
        assert!(
            matches!(err, ForgeError::TemplateResolution { ref template_id, .. } if template_id == "no_such_base.html"),
            "{err}"
        );
    }

    #[test]
    fn references_are_read_from_tags() {
        let refs = template_references(
            r#"{%- extends "base.html" -%}
               {% import 'macros.html' as m %}
               {% include ["a.html", "b.html"] ignore missing %}
               {% if x %}{{ "not/a/template.html" }}{% endif %}"#,
        );
        let names: Vec<(&str, bool)> = refs.iter().map(|r| (r.name.as_str(), r.required)).collect();
        assert_eq!(
            names,
            vec![
                ("base.html", true),
                ("macros.html", true),
                ("a.html", false),
                ("b.html", false),
            ]
        );
    }

    #[test]
    fn non_finite_kpi_renders_placeholders() {
        let html = render(&document![[
            Component::kpi(f64::NAN, 1.0, "nan"),
            Component::kpi(f64::MAX, -f64::MAX, "overflow"),
            Component::kpi(f64::INFINITY, 2.0, "inf"),
        ]]);
        assert!(html.contains("n/a"), "{html}");
        assert!(html.contains("target 1"));
        assert!(html.contains(">overflow</div>"));
    }

    #[test]
    fn markup_is_deterministic() {
        let build = || {
            document![
                Component::section("KPIs"),
                [Component::number(150, "Samples"), Component::kpi(482.537, 595.092, "Compare")],
                Component::page_break(),
            ]
        };
        let first = Sha256::digest(render(&build()).as_bytes());
        let second = Sha256::digest(render(&build()).as_bytes());
        assert_eq!(first, second);
    }
}
