// Command-line interface for nbdeck
//
// This binary builds notebooks into pages and slide decks, converts single documents and
// inspects the intermediate representations. The heavy lifting lives in nbdeck-babel; this
// crate only wires arguments, configuration and logging to it.
//
// Usage:
//  nbdeck <input> --to <format> [--output <file>]          - Convert one document (default)
//  nbdeck convert <input> --to <format> [--output <file>]  - Same as above (explicit)
//  nbdeck build <source-dir> [--output <dir>]              - Build every document in a directory
//  nbdeck inspect <path> [<transform>]                     - Show tokens, tree or env
//  nbdeck cache <source-dir> <notebook>...                 - Store executed notebooks
//  nbdeck --list-formats                                   - List output formats and transforms
//
// Extra Parameters:
//
// Configuration keys can be overridden with --extra-<section.key> <value>.
// The CLI layer strips the "extra-" prefix and applies the value on top of the loaded files.
// Example:
//  nbdeck build docs --extra-execution.mode cache --extra-presentation.enabled false

mod transforms;

use clap::{Arg, ArgAction, Command, ValueHint};
use nbdeck_babel::adapter::{DocumentTarget, NotebookParser};
use nbdeck_babel::build::Builder;
use nbdeck_babel::execution::DirectoryCache;
use nbdeck_babel::page::{DownloadSourceHook, PageContext, PageHooks};
use nbdeck_babel::presentation::{is_slide_deck, PresentationTrigger};
use nbdeck_babel::publish::{publish, PublishArtifact, PublishSpec};
use nbdeck_babel::static_assets;
use nbdeck_babel::{FormatRegistry, Notebook, RenderTarget};
use nbdeck_config::{Loader, NbdeckConfig, PROJECT_CONFIG_FILE};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Parse extra-* arguments from command line args
/// Returns (cleaned_args_without_extras, extra_params_map)
///
/// Supports both:
/// - `--extra-<key> <value>` (explicit value)
/// - `--extra-<key>` (boolean flag, defaults to "true")
/// - `--extras-<key>` (alias for `--extra-<key>`)
fn parse_extra_args(args: &[String]) -> (Vec<String>, HashMap<String, String>) {
    let mut cleaned_args = Vec::new();
    let mut extra_params = HashMap::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        let key_opt = if let Some(key) = arg.strip_prefix("--extra-") {
            Some(key)
        } else {
            arg.strip_prefix("--extras-")
        };

        if let Some(key) = key_opt {
            let has_value = if i + 1 < args.len() {
                !args[i + 1].starts_with('-')
            } else {
                false
            };

            if has_value {
                extra_params.insert(key.to_string(), args[i + 1].clone());
                i += 2;
            } else {
                extra_params.insert(key.to_string(), "true".to_string());
                i += 1;
            }
            continue;
        }

        cleaned_args.push(arg.clone());
        i += 1;
    }

    (cleaned_args, extra_params)
}

fn build_cli() -> Command {
    Command::new("nbdeck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build Jupyter notebooks into documents and slide decks")
        .long_about(
            "nbdeck converts Jupyter notebooks and text notebooks into HTML pages and\n\
            other formats. Pages whose cells carry slideshow metadata get a\n\
            'Start presenting' button.\n\n\
            Commands:\n  \
            - build:   Convert every notebook in a directory\n  \
            - convert: Convert a single document (default command)\n  \
            - inspect: View internal representations (tokens, tree, env)\n  \
            - cache:   Store executed notebooks for execution.mode = \"cache\"\n\n\
            Extra Parameters:\n  \
            Use --extra-<section.key> [value] to override configuration keys.\n  \
            Boolean flags can omit the value (defaults to 'true').\n\n\
            Examples:\n  \
            nbdeck build docs                         # Build docs/ into docs/_build\n  \
            nbdeck build docs -o site                 # Build into site/\n  \
            nbdeck deck.ipynb --to html -o deck.html  # Convert one notebook\n  \
            nbdeck inspect deck.ipynb tokens-json     # View the token stream",
        )
        .arg_required_else_help(true)
        .subcommand_required(false)
        .arg(
            Arg::new("list-formats")
                .long("list-formats")
                .help("List available output formats and inspect transforms")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to an nbdeck.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase log output (-v info, -vv debug)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("build")
                .about("Build every notebook and markdown file in a directory")
                .long_about(
                    "Convert every .ipynb and .md file below a source directory.\n\n\
                    Hidden directories and directories starting with '_' are skipped.\n\
                    Pages are written as <out>/<docname>.<ext>; HTML builds also\n\
                    install the presentation scripts into <out>/_static/.\n\n\
                    A document that fails to convert is reported and the others are\n\
                    still built. The exit status is non-zero when any document failed.",
                )
                .arg(
                    Arg::new("source")
                        .help("Source directory")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output directory (defaults to <source>/_build)")
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Output format (defaults to the configured one)")
                        .value_hint(ValueHint::Other),
                ),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a single document (default command)")
                .long_about(
                    "Convert one notebook or markdown document.\n\n\
                    Supported formats: html, latex, man, text\n\n\
                    Output goes to stdout by default, or use -o to specify a file.\n\
                    Outputs are inlined into the page; use 'build' to write them as files.\n\n\
                    Examples:\n  \
                    nbdeck convert deck.ipynb --to html -o deck.html\n  \
                    nbdeck deck.ipynb --to text                 # 'convert' is optional",
                )
                .arg(
                    Arg::new("input")
                        .help("Input file path")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Target format (required)")
                        .required(true)
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output file path (defaults to stdout)")
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Inspect internal representations of a document")
                .long_about(
                    "View a document at different processing stages.\n\n\
                    Transforms:\n  \
                    - tokens-simple: Token stream, one token per line (default)\n  \
                    - tokens-json:   Token stream as JSON\n  \
                    - tree-json:     Document tree as JSON\n  \
                    - env-json:      Reference environment as JSON\n  \
                    - diagnostics:   Conversion warnings",
                )
                .arg(
                    Arg::new("path")
                        .help("Path to the document")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("transform")
                        .help("Transform to apply. Defaults to 'tokens-simple'")
                        .required(false)
                        .value_parser(clap::builder::PossibleValuesParser::new(
                            transforms::AVAILABLE_TRANSFORMS,
                        ))
                        .index(2)
                        .value_hint(ValueHint::Other),
                ),
        )
        .subcommand(
            Command::new("cache")
                .about("Store executed notebooks in the execution cache")
                .long_about(
                    "Store notebooks that were executed elsewhere so that builds with\n\
                    execution.mode = \"cache\" attach their outputs.\n\n\
                    Entries are keyed by the code cell sources and written to the configured\n\
                    execution.cache_path, resolved against the source directory.\n\n\
                    Example:\n  \
                    nbdeck cache docs executed/deck.ipynb\n  \
                    nbdeck build docs --extra-execution.mode cache",
                )
                .arg(
                    Arg::new("source")
                        .help("Source directory the cache belongs to")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("notebooks")
                        .help("Executed notebooks to store")
                        .required(true)
                        .num_args(1..)
                        .index(2)
                        .value_hint(ValueHint::FilePath),
                ),
        )
}

fn main() {
    // Try to parse args. If no subcommand is provided, inject "convert"
    let args: Vec<String> = std::env::args().collect();
    let (cleaned_args, extra_params) = parse_extra_args(&args);

    let cli = build_cli();
    let matches = match cli.clone().try_get_matches_from(&cleaned_args) {
        Ok(m) => m,
        Err(e) => {
            if cleaned_args.len() > 1
                && !cleaned_args[1].starts_with('-')
                && !["build", "convert", "inspect", "cache", "help"]
                    .contains(&cleaned_args[1].as_str())
            {
                let mut new_args = vec![cleaned_args[0].clone(), "convert".to_string()];
                new_args.extend_from_slice(&cleaned_args[1..]);
                match cli.try_get_matches_from(&new_args) {
                    Ok(m) => m,
                    Err(e2) => e2.exit(),
                }
            } else {
                e.exit();
            }
        }
    };

    init_tracing(matches.get_count("verbose"));

    if matches.get_flag("list-formats") {
        handle_list_formats_command();
        return;
    }

    let config = load_cli_config(
        matches.get_one::<String>("config").map(|s| s.as_str()),
        &extra_params,
    );

    match matches.subcommand() {
        Some(("build", sub_matches)) => {
            let source = sub_matches
                .get_one::<String>("source")
                .expect("source is required");
            let output = sub_matches.get_one::<String>("output").map(|s| s.as_str());
            let to = sub_matches.get_one::<String>("to").map(|s| s.as_str());
            handle_build_command(source, output, to, &config);
        }
        Some(("convert", sub_matches)) => {
            let input = sub_matches
                .get_one::<String>("input")
                .expect("input is required");
            let to = sub_matches.get_one::<String>("to").expect("to is required");
            let output = sub_matches.get_one::<String>("output").map(|s| s.as_str());
            handle_convert_command(input, to, output, &config);
        }
        Some(("inspect", sub_matches)) => {
            let path = sub_matches
                .get_one::<String>("path")
                .expect("path is required");
            let transform = sub_matches
                .get_one::<String>("transform")
                .map(|s| s.as_str())
                .unwrap_or(transforms::DEFAULT_TRANSFORM);
            handle_inspect_command(path, transform, &config);
        }
        Some(("cache", sub_matches)) => {
            let source = sub_matches
                .get_one::<String>("source")
                .expect("source is required");
            let notebooks: Vec<&String> = sub_matches
                .get_many::<String>("notebooks")
                .expect("notebooks are required")
                .collect();
            handle_cache_command(source, &notebooks, &config);
        }
        _ => {
            eprintln!("Unknown subcommand. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so converted output on stdout stays clean. `RUST_LOG` wins over `-v`.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("nbdeck_babel={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn notebook_parser(config: &NbdeckConfig) -> NotebookParser {
    NotebookParser::new((&config.parser).into())
        .with_execution((&config.execution).into())
        .with_renderer(config.render.plugin.clone())
}

/// Handle the build command
fn handle_build_command(
    source: &str,
    output: Option<&str>,
    to: Option<&str>,
    config: &NbdeckConfig,
) {
    let mut options = config.build_options(Path::new(source), output.map(Path::new));
    if let Some(format) = to {
        options.format = format.to_string();
    }
    let out_dir = options.out_dir.clone();

    let report = Builder::new(options).run().unwrap_or_else(|e| {
        eprintln!("Build failed: {e}");
        std::process::exit(1);
    });

    for diagnostic in report.diagnostics() {
        eprintln!("{diagnostic}");
    }
    for failure in &report.failures {
        eprintln!("Error: {}: {}", failure.docname, failure.message);
    }
    let decks = report.documents.iter().filter(|doc| doc.slide_deck).count();
    println!(
        "Built {} document(s) ({decks} slide deck(s)) into {}",
        report.documents.len(),
        out_dir.display()
    );

    if !report.is_success() {
        std::process::exit(1);
    }
}

/// Handle the convert command
fn handle_convert_command(input: &str, to: &str, output: Option<&str>, config: &NbdeckConfig) {
    let registry = FormatRegistry::default();
    let target = match registry.get(to) {
        Ok(format) => format.target(),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let source = fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Error reading file '{input}': {e}");
        std::process::exit(1);
    });

    let document_target = DocumentTarget::from_path(Path::new(input));
    let parsed = notebook_parser(config)
        .parse(&source, &document_target)
        .unwrap_or_else(|e| {
            eprintln!("Parse error: {e}");
            std::process::exit(1);
        });
    for diagnostic in &parsed.diagnostics {
        eprintln!("{diagnostic}");
    }

    let title = parsed
        .document
        .title()
        .unwrap_or_else(|| document_target.docname.clone());
    let mut page = PageContext::new(document_target.docname.clone(), title);
    let mut hooks = PageHooks::new();
    hooks.register(DownloadSourceHook);
    if config.presentation.enabled {
        hooks.register(PresentationTrigger);
    }
    hooks.run(&mut page, &parsed.document);

    let needs_assets = config.presentation.enabled
        && target == RenderTarget::Html
        && is_slide_deck(&parsed.document, &document_target.docname);
    if needs_assets {
        install_presentation_assets(output);
    }

    let mut spec = PublishSpec::new(&parsed.document, to).with_page(page);
    if let Some(path) = output {
        spec = spec.with_output_path(path);
    }
    let result = publish(spec, &registry).unwrap_or_else(|e| {
        eprintln!("Serialization error: {e}");
        std::process::exit(1);
    });

    if let PublishArtifact::InMemory(text) = result.artifact {
        print!("{text}");
    }
}

/// The page links `_static/` relative to itself, so the assets go next to the output file.
fn install_presentation_assets(output: Option<&str>) {
    let Some(output) = output else {
        eprintln!(
            "Warning: presentation assets were not written; use --output to install them \
             into _static/ next to the page"
        );
        return;
    };
    let out_dir = Path::new(output)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if let Err(e) = static_assets::install(out_dir) {
        eprintln!("Error installing presentation assets: {e}");
        std::process::exit(1);
    }
}

/// Handle the inspect command
fn handle_inspect_command(path: &str, transform: &str, config: &NbdeckConfig) {
    let source = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{path}': {e}");
        std::process::exit(1);
    });

    let target = DocumentTarget::from_path(Path::new(path));
    let parser = notebook_parser(config);
    let output = transforms::execute_transform(&source, &target, transform, &parser)
        .unwrap_or_else(|e| {
            eprintln!("Execution error: {e}");
            std::process::exit(1);
        });

    print!("{output}");
}

/// Handle the cache command
fn handle_cache_command(source: &str, notebooks: &[&String], config: &NbdeckConfig) {
    let cache = DirectoryCache::new(config.cache_dir(Path::new(source)));
    for path in notebooks {
        let text = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error reading file '{path}': {e}");
            std::process::exit(1);
        });
        let notebook = Notebook::from_ipynb_str(&text).unwrap_or_else(|e| {
            eprintln!("Error: {path}: {e}");
            std::process::exit(1);
        });
        let entry = cache.store(&notebook).unwrap_or_else(|e| {
            eprintln!("Error writing cache entry for '{path}': {e}");
            std::process::exit(1);
        });
        println!("Cached {path} as {}", entry.display());
    }
}

/// Handle the list-formats command
fn handle_list_formats_command() {
    println!("Output formats:");
    let registry = FormatRegistry::default();
    for format_name in registry.list_formats() {
        let description = registry
            .get(&format_name)
            .map(|format| format.description().to_string())
            .unwrap_or_default();
        println!("  {format_name:<8} {description}");
    }

    println!("\nInspect transforms:");
    for transform_name in transforms::AVAILABLE_TRANSFORMS {
        println!("  {transform_name}");
    }
}

fn load_cli_config(
    explicit_path: Option<&str>,
    overrides: &HashMap<String, String>,
) -> NbdeckConfig {
    let loader = Loader::new().with_optional_file(PROJECT_CONFIG_FILE);
    let mut loader = if let Some(path) = explicit_path {
        loader.with_file(path)
    } else {
        loader
    };

    let mut keys: Vec<&String> = overrides.keys().collect();
    keys.sort();
    for key in keys {
        let value = override_value(&overrides[key]);
        loader = loader.set_override(key, value).unwrap_or_else(|err| {
            eprintln!("Invalid override --extra-{key}: {err}");
            std::process::exit(1);
        });
    }

    loader.build().unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        std::process::exit(1);
    })
}

/// Booleans are typed so they override boolean keys; anything else stays a string.
fn override_value(raw: &str) -> config::ValueKind {
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "y" => config::ValueKind::Boolean(true),
        "false" | "no" | "n" => config::ValueKind::Boolean(false),
        _ => config::ValueKind::String(raw.to_string()),
    }
}
