//! forge – command-line report renderer.
//!
//! Usage:
//!   forge <report.json> [output.pdf] [--build-dir DIR] [--css FILE]
//!
//! If `output.pdf` is omitted the PDF is written to `out.pdf` in
//! `$FORGE_OUTPUT_DIR` (or the working directory when that is unset).

use std::{env, path::PathBuf, process};

use report_forge::{ForgeConfig, Manifest, RenderOptions, Renderer};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut build_dir: Option<PathBuf> = None;
    let mut css: Option<PathBuf> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--build-dir" | "-b" => build_dir = Some(flag_value(&args[0], arg, iter.next())),
            "--css" | "-c" => css = Some(flag_value(&args[0], arg, iter.next())),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => {
            eprintln!("Error: no report manifest specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let manifest = match Manifest::load(&input) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    // Templates next to the manifest resolve like templates in the working directory.
    let mut config = ForgeConfig::from_env();
    config
        .extra_template_roots
        .push(manifest.base_dir().to_path_buf());

    let options = render_options(output_path, build_dir, css.or_else(|| manifest.stylesheet()));

    let document = match manifest.into_document() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match Renderer::new(config).render(&document, &options) {
        Ok(report) => {
            eprintln!(
                "Wrote '{}' ({} bytes, {} row{})",
                report.output.display(),
                report.pdf_bytes,
                document.rows().len(),
                if document.rows().len() == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Only what the user chose; everything else falls back to [`ForgeConfig`].
fn render_options(
    output: Option<PathBuf>,
    build_dir: Option<PathBuf>,
    css: Option<PathBuf>,
) -> RenderOptions {
    let mut options = RenderOptions::new();
    if let Some(output) = output {
        options = options.output(output);
    }
    if let Some(dir) = build_dir {
        options = options.build_dir(dir);
    }
    if let Some(css) = css {
        options = options.css(css);
    }
    options
}

fn flag_value(prog: &str, flag: &str, value: Option<&String>) -> PathBuf {
    match value {
        Some(v) => PathBuf::from(v),
        None => {
            eprintln!("Error: {flag} needs a value.");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("forge – report renderer (report-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <report.json> [output.pdf] [--build-dir DIR] [--css FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <report.json>  Report manifest (rows of components)");
    eprintln!("  [output.pdf]   Output path  (default: $FORGE_OUTPUT_DIR/out.pdf, else ./out.pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --build-dir, -b  Directory for out.html / out.css (default: ./build)");
    eprintln!("  --css, -c        Stylesheet to compile instead of the bundled one");
    eprintln!("  --help           Print this message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FORGE_OUTPUT_DIR  Directory of the default out.pdf");
    eprintln!("  RUST_LOG          Log filter, e.g. RUST_LOG=report_forge=debug");
}
