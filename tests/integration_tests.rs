//! Integration tests for the report-forge pipeline.
//!
//! These tests validate:
//! - Documents built through the public API render to the expected markup
//! - Manifests (including the bundled demos) load and resolve their templates
//! - The renderer wires its stages together with injected collaborators
//! - Live renders with `tailwindcss` and Chromium produce real PDFs
//!
//! Live tests print a notice and return early when either tool is missing.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use serde_json::json;

use report_forge::config::{CSS_FILE, HTML_FILE};
use report_forge::document;
use report_forge::error::Result as ForgeResult;
use report_forge::style::{StyleCompiler, StyleJob};
use report_forge::templates::generate_markup;
use report_forge::{
    relative_to, Component, Document, ForgeConfig, ForgeError, Frame, Manifest, PathError,
    RenderOptions, Renderer, Stage, Table,
};

// =====================================================================
// Helpers
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 500, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn manifest_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

fn markup(document: &Document) -> String {
    generate_markup(document, &ForgeConfig::default(), CSS_FILE).unwrap()
}

fn tailwind_available() -> bool {
    Command::new("tailwindcss").arg("--help").output().is_ok()
}

fn chrome_available() -> bool {
    headless_chrome::browser::default_executable().is_ok() || Path::new("/usr/bin/chromium").exists()
}

/// Skip live tests on machines without the toolchain.
fn live_tools() -> bool {
    let ok = tailwind_available() && chrome_available();
    if !ok {
        eprintln!("skipping: tailwindcss and a Chromium browser are required for live renders");
    }
    ok
}

/// Noisy RGB image; noise keeps the PNG from compressing away.
fn noise_image(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x2545_f491;
    RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    })
}

fn render_live(document: &Document, options: RenderOptions) -> (tempfile::TempDir, Vec<u8>, PathBuf) {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("report.pdf");
    let options = options.build_dir(scratch.path().join("build")).output(&output);
    let report = Renderer::new(ForgeConfig::default())
        .render(document, &options)
        .unwrap_or_else(|e| panic!("render failed: {e}"));
    assert_eq!(report.output, output);
    let bytes = fs::read(&output).unwrap();
    let build = scratch.path().join("build");
    (scratch, bytes, build)
}

// =====================================================================
// Path relativization
// =====================================================================

#[test]
fn relative_to_walks_up_to_siblings() {
    let rel = relative_to(Path::new("/a/b/c.txt"), Path::new("/a/d/e")).unwrap();
    assert_eq!(rel, PathBuf::from("../../b/c.txt"));
}

#[test]
fn relative_to_rejects_unrelated_and_dotdot_bases() {
    assert!(matches!(
        relative_to(Path::new("a/b"), Path::new("/a")),
        Err(PathError::IncompatibleAnchors { .. })
    ));
    assert!(matches!(
        relative_to(Path::new("/a/b"), Path::new("/a/../c")),
        Err(PathError::InvalidBasePath { .. })
    ));
}

// =====================================================================
// Markup through the public API
// =====================================================================

#[test]
fn list_table_markup_pads_jagged_rows() {
    let html = markup(&document![Component::table(
        vec![vec![0, 1], vec![2], vec![3, 4]],
        "Test"
    )]);
    assert_eq!(html.matches("<tr").count(), 3);
    assert_eq!(html.matches("<td").count(), 6);
    assert!(html.contains(">Test<"));
}

#[test]
fn frame_table_markup_has_named_headers() {
    let frame = Frame::new()
        .with_column("one", [123, 3])
        .with_column("two", ["wow", "some"])
        .with_column("0", [3, 3]);
    let html = markup(&document![Component::table(frame, "Df table")]);
    assert!(html.contains(">one</th>"));
    assert!(html.contains(">two</th>"));
    assert!(html.contains("wow</td>"));
}

#[test]
fn explicit_headers_override_column_names() {
    let frame = Frame::new().with_column("a", [1]).with_column("b", [2]);
    let table = Table::new(frame, "Renamed").with_headers(["Left", "Right"]);
    let html = markup(&document![Component::from(table)]);
    assert!(html.contains(">Left</th>"));
    assert!(!html.contains(">a</th>"));
}

#[test]
fn every_variant_has_a_partial() {
    let scratch = tempfile::tempdir().unwrap();
    let logo = scratch.path().join("logo.png");
    noise_image(8, 8).save(&logo).unwrap();

    let html = markup(&document![
        Component::title("Report"),
        Component::section("Overview"),
        Component::paragraph("<b>bold</b> text"),
        [
            Component::number(150, "Samples").with_col_span(2),
            Component::kpi(482.5, 595.0, "Revenue"),
        ],
        [Component::image(&logo), Component::figure(RgbaImage::new(4, 4))],
        Component::page_break(),
    ]);

    assert!(html.contains("Report"));
    assert!(html.contains("<b>bold</b>"));
    assert!(html.contains("pf-number-content"));
    assert_eq!(html.matches("data:image/png;base64,").count(), 2);
    assert!(html.contains("grid-cols-3"));
}

#[test]
fn failing_payload_aborts_markup() {
    let err = generate_markup(
        &document![Component::image("/nonexistent/forge/logo.png")],
        &ForgeConfig::default(),
        CSS_FILE,
    )
    .unwrap_err();
    assert!(matches!(err, ForgeError::Io { .. }), "{err}");
}

// =====================================================================
// Manifests and demos
// =====================================================================

#[test]
fn demo_manifests_render_to_markup() {
    for demo in ["demos/custom/report.json", "demos/overview/report.json"] {
        let manifest = Manifest::load(manifest_dir().join(demo)).unwrap();
        let config =
            ForgeConfig::default().with_extra_template_roots([manifest.base_dir().to_path_buf()]);
        let document = manifest.into_document().unwrap();
        assert!(!document.is_empty(), "{demo} is empty");
        generate_markup(&document, &config, CSS_FILE)
            .unwrap_or_else(|e| panic!("{demo}: {e}"));
    }
}

#[test]
fn custom_demo_uses_its_local_template() {
    let manifest = Manifest::load(manifest_dir().join("demos/custom/report.json")).unwrap();
    let config =
        ForgeConfig::default().with_extra_template_roots([manifest.base_dir().to_path_buf()]);
    let html = generate_markup(&manifest.into_document().unwrap(), &config, CSS_FILE).unwrap();
    assert!(html.contains("pf-two-numbers"), "{html}");
    assert!(html.contains("3141"));
}

#[test]
fn custom_template_missing_from_all_roots() {
    let manifest = Manifest::parse(
        r#"{ "rows": [ { "kind": "custom", "template": "nowhere.html", "context": {} } ] }"#,
        ".",
    )
    .unwrap();
    let err = generate_markup(
        &manifest.into_document().unwrap(),
        &ForgeConfig::default(),
        CSS_FILE,
    )
    .unwrap_err();
    assert!(matches!(err, ForgeError::TemplateResolution { .. }));
}

// =====================================================================
// Renderer with injected collaborators
// =====================================================================

struct EchoStyles;

impl StyleCompiler for EchoStyles {
    fn compile(&self, job: &StyleJob) -> ForgeResult<()> {
        let css = fs::read_to_string(&job.input).map_err(|e| ForgeError::io(&job.input, e))?;
        fs::write(&job.output, css).map_err(|e| ForgeError::io(&job.output, e))
    }
}

#[test]
fn printer_failure_leaves_markup_for_diagnosis() {
    let scratch = tempfile::tempdir().unwrap();
    let build = scratch.path().join("build");
    let output = scratch.path().join("report.pdf");
    let renderer = Renderer::new(ForgeConfig::default())
        .with_style_compiler(EchoStyles)
        .with_printer(BrokenPrinter);

    let err = renderer
        .render(
            &document![Component::custom(
                "src/partials/title.html",
                json!({ "text": "Only a title" })
            )],
            &RenderOptions::new().build_dir(&build).output(&output),
        )
        .unwrap_err();

    assert_eq!(err.stage, Stage::Print);
    assert!(fs::read_to_string(build.join(HTML_FILE))
        .unwrap()
        .contains("Only a title"));
    assert!(build.join(CSS_FILE).is_file());
    assert!(!output.exists());
}

struct BrokenPrinter;

impl report_forge::print::PdfPrinter for BrokenPrinter {
    fn print(&self, _html: &Path, _page: &report_forge::PageSetup) -> ForgeResult<Vec<u8>> {
        Err(ForgeError::Print("target crashed".into()))
    }
}

// =====================================================================
// Live renders (tailwindcss + Chromium)
// =====================================================================

#[test]
fn live_list_table() {
    if !live_tools() {
        return;
    }
    let doc = document![Component::table(vec![vec![0, 1], vec![2], vec![3, 4]], "Test")];
    let (_scratch, pdf, build) = render_live(&doc, RenderOptions::new());

    assert_valid_pdf(&pdf);
    assert!(fs::metadata(build.join(HTML_FILE)).unwrap().len() > 0);
    assert!(fs::metadata(build.join(CSS_FILE)).unwrap().len() > 0);
}

#[test]
fn live_frame_table() {
    if !live_tools() {
        return;
    }
    let frame = Frame::new()
        .with_column("one", [123, 3])
        .with_column("two", ["wow", "some"])
        .with_column("0", [3, 3]);
    let doc = document![Component::table(frame, "Df table")];
    let (_scratch, pdf, build) = render_live(&doc, RenderOptions::new());

    assert_valid_pdf(&pdf);
    assert!(fs::read_to_string(build.join(HTML_FILE))
        .unwrap()
        .contains("wow</td>"));
}

#[test]
fn live_custom_stylesheet() {
    if !live_tools() {
        return;
    }
    let css = manifest_dir().join("tests/stubs/test.css");
    let doc = document![Component::number(3, "3")];
    let (_scratch, pdf, build) = render_live(&doc, RenderOptions::new().css(css));

    assert_valid_pdf(&pdf);
    let compiled = fs::read_to_string(build.join(CSS_FILE)).unwrap();
    assert!(compiled.contains("::before"));
    assert!(compiled.contains(".pf-number-content"));
}

#[test]
fn live_all_components() {
    if !live_tools() {
        return;
    }
    let scratch = tempfile::tempdir().unwrap();
    let photo = scratch.path().join("photo.png");
    noise_image(640, 420).save(&photo).unwrap();

    let frame = Frame::new()
        .with_column("Species", ["Adelie", "Chinstrap", "Gentoo"])
        .with_column("Count", [152, 68, 124])
        .with_column("Mass (g)", [3700.7, 3733.1, 5076.0]);

    let doc = document![
        Component::title("My Title"),
        Component::section("Section 1"),
        Component::paragraph("<b>This</b> <i>is</i> a <b>test</b> paragraph."),
        [
            Component::number(150, "Samples").with_col_span(2),
            Component::number(3, "Species"),
            Component::kpi(482.537, 595.092, "Compare"),
        ],
        Component::table(frame, "Penguins"),
        Component::page_break(),
        Component::section("Section 2"),
        [
            Component::image(&photo),
            Component::figure(DynamicImage::ImageRgb8(noise_image(480, 320))),
        ],
        Component::table(vec![vec![0, 1], vec![2], vec![3, 4]], "Jagged"),
    ];

    let (_scratch, pdf, _build) = render_live(&doc, RenderOptions::new());
    assert_valid_pdf(&pdf);
    assert!(pdf.len() > 90_000, "PDF only {} bytes", pdf.len());
}
